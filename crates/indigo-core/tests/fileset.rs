//! FileSet serialization through a self-describing codec

use indigo_core::token::{FileSet, SerializedFileSet};

#[test]
fn json_round_trip_preserves_positions() {
    let fset = FileSet::new();
    let a = fset.add_file("a.ing", None, 30);
    a.add_line(10);
    a.add_line(20);
    let b = fset.add_file("b.ing", None, 12);
    b.add_line(5);
    b.add_line_info(5, "template.ing", 99);

    let mut encoded = String::new();
    fset.write(|ss| {
        encoded = serde_json::to_string(ss)?;
        Ok::<(), serde_json::Error>(())
    })
    .expect("encode");

    let restored = FileSet::new();
    restored
        .read(|| serde_json::from_str::<SerializedFileSet>(&encoded))
        .expect("decode");

    // equal registries resolve positions identically
    assert_eq!(restored.base(), fset.base());
    let files = restored.files();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].name(), "a.ing");
    assert_eq!(restored.position(files[0].pos(12)).line, 2);
    let overridden = restored.position(files[1].pos(6));
    assert_eq!(overridden.filename, "template.ing");

    // writing the restored set reproduces the wire record
    let mut encoded2 = String::new();
    restored
        .write(|ss| {
            encoded2 = serde_json::to_string(ss)?;
            Ok::<(), serde_json::Error>(())
        })
        .expect("encode again");
    assert_eq!(encoded, encoded2);
}
