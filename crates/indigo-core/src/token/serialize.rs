//! FileSet serialization
//!
//! The wire format is a flat mirror of the in-memory registry; the concrete
//! encoding is chosen by the embedder through the encode/decode callbacks.

use serde::{Deserialize, Serialize};

use super::position::{FileSet, LineInfo};

/// Wire mirror of a registered file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedFile {
    pub name: String,
    pub base: u32,
    pub size: u32,
    pub lines: Vec<u32>,
    pub infos: Vec<LineInfo>,
}

/// Wire mirror of a [`FileSet`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedFileSet {
    pub base: u32,
    pub files: Vec<SerializedFile>,
}

impl FileSet {
    /// Serialize the file set through the given encoder callback
    ///
    /// # Errors
    ///
    /// Propagates whatever error the encoder reports.
    pub fn write<E>(&self, encode: impl FnOnce(&SerializedFileSet) -> Result<(), E>) -> Result<(), E> {
        let files = self
            .files()
            .iter()
            .map(|f| SerializedFile {
                name: f.name().to_string(),
                base: f.base(),
                size: f.size(),
                lines: f.lines_snapshot(),
                infos: f.infos_snapshot(),
            })
            .collect();
        encode(&SerializedFileSet {
            base: self.base(),
            files,
        })
    }

    /// Rebuild the registry from a decoded wire record, replacing the current
    /// contents and invalidating the last-file cache.
    ///
    /// # Errors
    ///
    /// Propagates whatever error the decoder reports.
    pub fn read<E>(&self, decode: impl FnOnce() -> Result<SerializedFileSet, E>) -> Result<(), E> {
        let ss = decode()?;
        let mut files = Vec::with_capacity(ss.files.len());
        for sf in ss.files {
            let file = FileSet::make_file(sf.name, sf.base, sf.size);
            file.set_lines(sf.lines);
            for info in sf.infos {
                file.add_line_info(info.offset, info.filename, info.line);
            }
            files.push(file);
        }
        self.restore(ss.base, files);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let fset = FileSet::new();
        let f = fset.add_file("x.ing", None, 40);
        f.add_line(10);
        f.add_line(25);
        f.add_line_info(25, "other.ing", 7);

        let mut wire = None;
        fset.write(|ss| -> Result<(), ()> {
            wire = Some(ss.clone());
            Ok(())
        })
        .unwrap();
        let wire = wire.unwrap();

        let restored = FileSet::new();
        restored.read(|| -> Result<_, ()> { Ok(wire.clone()) }).unwrap();

        let mut wire2 = None;
        restored
            .write(|ss| -> Result<(), ()> {
                wire2 = Some(ss.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(wire, wire2.unwrap());

        // Position lookup works on the restored set.
        let rf = restored.files()[0].clone();
        assert_eq!(restored.position(rf.pos(12)).line, 2);
    }
}
