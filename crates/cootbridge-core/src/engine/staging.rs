//! Staging payloads into the engine filesystem for path-based operations.
//!
//! Every file placed into the engine's namespace on behalf of a single command is owned by
//! a guard. The guard removes the file when it goes out of scope, which covers the normal
//! return as well as every early return through `?`.

use super::error::{BridgeError, ProtocolFault};
use crate::core::utils::guid::staging_guid;
use crate::core::vfs::{VirtualFs, join_path};
use serde_json::Value;
use std::rc::Rc;
use tracing::{debug, warn};

/// What a staged payload contains; decides the extension the engine reader keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Coordinates,
    Reflections,
    Map,
    Dictionary,
}

const MAP_EXTENSIONS: [&str; 4] = [".map.gz", ".mrc.gz", ".mrc", ".map"];

impl PayloadKind {
    /// The extension a staged file gets, derived from the host's source file name when the
    /// engine reader depends on it.
    pub fn staged_extension(self, source_name: Option<&str>) -> &'static str {
        let source = source_name.unwrap_or_default().to_ascii_lowercase();
        match self {
            PayloadKind::Map => MAP_EXTENSIONS
                .iter()
                .find(|ext| source.ends_with(*ext))
                .copied()
                .unwrap_or(".map"),
            PayloadKind::Coordinates => {
                if source.ends_with(".cif") || source.ends_with(".mmcif") {
                    ".cif"
                } else {
                    ".pdb"
                }
            }
            PayloadKind::Reflections => ".mtz",
            PayloadKind::Dictionary => ".cif",
        }
    }
}

/// A file staged into the engine filesystem for the duration of one engine call.
#[derive(Debug)]
pub struct StagedFile {
    fs: Rc<dyn VirtualFs>,
    path: String,
    retained: bool,
}

impl StagedFile {
    /// Writes `bytes` to `dir/name`.
    pub fn create(
        fs: Rc<dyn VirtualFs>,
        dir: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<Self, BridgeError> {
        let path = fs
            .create_file(dir, name, bytes)
            .map_err(|source| BridgeError::staging(join_path(dir, name), source))?;
        debug!(path = %path, size = bytes.len(), "Staged payload");
        Ok(Self {
            fs,
            path,
            retained: false,
        })
    }

    /// Writes `bytes` under a fresh collision-resistant name with the given extension.
    pub fn with_generated_name(
        fs: Rc<dyn VirtualFs>,
        dir: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<Self, BridgeError> {
        let name = format!("{}{}", staging_guid(), extension);
        Self::create(fs, dir, &name, bytes)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Disarms the guard and leaves the file in place, returning its path.
    pub fn keep(mut self) -> String {
        self.retained = true;
        self.path.clone()
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.retained {
            return;
        }
        match self.fs.unlink(&self.path) {
            Ok(()) => debug!(path = %self.path, "Removed staged payload"),
            Err(e) => warn!(path = %self.path, error = %e, "Failed to remove staged payload"),
        }
    }
}

/// A reserved output path for an engine operation that writes a file. Whatever the engine
/// wrote there is removed when the guard goes out of scope.
#[derive(Debug)]
pub struct ScratchPath {
    fs: Rc<dyn VirtualFs>,
    path: String,
}

impl ScratchPath {
    pub fn reserve(fs: Rc<dyn VirtualFs>, dir: &str, extension: &str) -> Self {
        let path = format!("./{}", join_path(dir, &format!("{}{}", staging_guid(), extension)));
        Self { fs, path }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<u8>, BridgeError> {
        self.fs
            .read_file(&self.path)
            .map_err(|source| BridgeError::staging(self.path.clone(), source))
    }
}

impl Drop for ScratchPath {
    fn drop(&mut self) {
        if self.fs.exists(&self.path) {
            if let Err(e) = self.fs.unlink(&self.path) {
                warn!(path = %self.path, error = %e, "Failed to remove scratch output");
            }
        }
    }
}

/// Decodes a binary payload: a JSON array of byte values or a text string.
pub fn payload_bytes(value: &Value, context: &str) -> Result<Vec<u8>, ProtocolFault> {
    match value {
        Value::String(text) => Ok(text.clone().into_bytes()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|byte| u8::try_from(byte).ok())
                    .ok_or_else(|| {
                        ProtocolFault::invalid_argument(context, "byte values must be 0-255")
                    })
            })
            .collect(),
        _ => Err(ProtocolFault::invalid_argument(
            context,
            "expected a byte array or a text payload",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vfs::MemoryFs;
    use serde_json::json;

    fn memory_fs() -> (Rc<MemoryFs>, Rc<dyn VirtualFs>) {
        let fs = Rc::new(MemoryFs::new());
        let shared: Rc<dyn VirtualFs> = fs.clone();
        (fs, shared)
    }

    #[test]
    fn map_names_keep_their_compressed_suffix() {
        let kind = PayloadKind::Map;
        assert_eq!(kind.staged_extension(Some("emd_1234.map.gz")), ".map.gz");
        assert_eq!(kind.staged_extension(Some("EMD.MRC.GZ")), ".mrc.gz");
        assert_eq!(kind.staged_extension(Some("density.mrc")), ".mrc");
        assert_eq!(kind.staged_extension(Some("density.ccp4")), ".map");
        assert_eq!(kind.staged_extension(None), ".map");
    }

    #[test]
    fn coordinate_names_pick_the_reader() {
        let kind = PayloadKind::Coordinates;
        assert_eq!(kind.staged_extension(Some("1abc.cif")), ".cif");
        assert_eq!(kind.staged_extension(Some("1abc.mmcif")), ".cif");
        assert_eq!(kind.staged_extension(Some("1abc.ent")), ".pdb");
        assert_eq!(PayloadKind::Reflections.staged_extension(Some("x.cif")), ".mtz");
    }

    #[test]
    fn staged_file_is_removed_when_the_guard_drops() {
        let (fs, shared) = memory_fs();
        let staged = StagedFile::with_generated_name(shared, ".", ".pdb", b"ATOM").unwrap();
        assert!(staged.path().ends_with(".pdb"));
        assert_eq!(fs.files().len(), 1);
        drop(staged);
        assert!(fs.files().is_empty());
    }

    #[test]
    fn staged_file_is_removed_when_a_later_step_fails() {
        let (fs, shared) = memory_fs();
        let attempt = || -> Result<(), BridgeError> {
            let staged = StagedFile::create(shared.clone(), ".", "in.mtz", b"MTZ")?;
            assert!(fs.exists(staged.path()));
            Err(ProtocolFault::MissingField("columns").into())
        };
        assert!(attempt().is_err());
        assert!(!fs.exists("in.mtz"));
    }

    #[test]
    fn kept_file_survives_its_guard() {
        let (fs, shared) = memory_fs();
        let staged = StagedFile::create(shared, ".", "map-data.mtz", b"MTZ").unwrap();
        let path = staged.keep();
        assert_eq!(path, "./map-data.mtz");
        assert!(fs.exists(&path));
    }

    #[test]
    fn rejected_write_is_a_staging_fault() {
        let (fs, shared) = memory_fs();
        fs.set_reject_writes(true);
        let err = StagedFile::create(shared, ".", "x.pdb", b"ATOM").unwrap_err();
        assert!(matches!(err, BridgeError::Staging { ref path, .. } if path == "x.pdb"));
    }

    #[test]
    fn scratch_output_is_removed_only_if_written() {
        let (fs, shared) = memory_fs();
        {
            let scratch = ScratchPath::reserve(shared.clone(), ".", ".map");
            fs.write_file(scratch.path(), b"MAP").unwrap();
            assert_eq!(scratch.read().unwrap(), b"MAP");
        }
        assert!(fs.files().is_empty());

        let scratch = ScratchPath::reserve(shared, ".", ".pdb");
        assert!(matches!(scratch.read(), Err(BridgeError::Staging { .. })));
    }

    #[test]
    fn payloads_decode_from_byte_arrays_and_text() {
        assert_eq!(payload_bytes(&json!([77, 84, 90]), "data").unwrap(), b"MTZ");
        assert_eq!(payload_bytes(&json!("ATOM"), "data").unwrap(), b"ATOM");
        assert!(payload_bytes(&json!([256]), "data").is_err());
        assert!(payload_bytes(&json!({"a": 1}), "data").is_err());
    }
}
