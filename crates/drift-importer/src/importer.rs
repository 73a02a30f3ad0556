use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use drift_model::{FileType, Hash, RelativePath, TreeEntry};
use drift_store::BlobInfoStore;
use tracing::{debug, warn};

use crate::assembler::ManifestAssembler;
use crate::channel::{FramedChannel, CMD_CAT_FILE, CMD_MANIFEST};
use crate::{ImportError, Result};

/// Client for the SCM helper protocol.
///
/// Owns one request/response channel and serves one request at a time;
/// run several importers (each with its own helper process) for
/// parallel imports. The transport is generic so tests can drive the
/// protocol from in-memory buffers; production use goes through
/// [`HelperImporter::spawn`].
pub struct ScmImporter<R, W> {
    channel: FramedChannel<R, W>,
    blobs: BlobInfoStore,
    helper: Option<Child>,
    // Chunk bodies land here across iterations to avoid reallocating.
    body_buf: Vec<u8>,
}

/// Importer over a spawned helper subprocess's pipes.
pub type HelperImporter = ScmImporter<ChildStdout, ChildStdin>;

impl HelperImporter {
    /// Start the helper for `repo` and connect to its pipes.
    ///
    /// The helper performs no startup handshake; a broken repository
    /// only surfaces as an error on the first request.
    pub fn spawn(helper: &Path, repo: &Path, blobs: BlobInfoStore) -> Result<Self> {
        let mut child = Command::new(helper)
            .arg(repo)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| ImportError::Spawn {
                command: helper.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take().expect("helper stdin is piped");
        let stdout = child.stdout.take().expect("helper stdout is piped");
        debug!(helper = %helper.display(), repo = %repo.display(), "spawned SCM helper");

        let mut importer = ScmImporter::new(stdout, stdin, blobs);
        importer.helper = Some(child);
        Ok(importer)
    }
}

impl<R: Read, W: Write> ScmImporter<R, W> {
    /// Build an importer over an existing transport pair.
    pub fn new(reader: R, writer: W, blobs: BlobInfoStore) -> Self {
        Self {
            channel: FramedChannel::new(reader, writer),
            blobs,
            helper: None,
            body_buf: Vec::new(),
        }
    }

    /// Import the manifest for `rev_name` and return the root tree
    /// identity.
    ///
    /// The response streams in as one or more chunks of concatenated
    /// manifest entries; every entry mints a blob identity and lands in
    /// the assembler, which produces the root hash once the final chunk
    /// (no more-chunks flag) has been consumed.
    pub fn import_manifest(&mut self, rev_name: &str) -> Result<Hash> {
        self.channel
            .send_request(CMD_MANIFEST, &[rev_name.as_bytes()])?;

        let mut assembler = ManifestAssembler::new();
        let mut num_paths = 0usize;
        let mut body = std::mem::take(&mut self.body_buf);

        let outcome = loop {
            let header = match self.channel.read_header() {
                Ok(header) => header,
                Err(e) => break Err(e),
            };
            if let Err(e) = self
                .channel
                .read_body_into(&mut body, header.data_length as usize)
            {
                break Err(e);
            }

            let mut cursor = &body[..];
            let mut parse_result = Ok(());
            while !cursor.is_empty() {
                if let Err(e) = self.read_manifest_entry(&mut assembler, &mut cursor) {
                    parse_result = Err(e);
                    break;
                }
                num_paths += 1;
            }
            if let Err(e) = parse_result {
                break Err(e);
            }

            if !header.has_more_chunks() {
                break Ok(());
            }
        };
        self.body_buf = body;
        outcome?;

        let root = assembler.finish();
        debug!(rev = rev_name, paths = num_paths, root = %root, "imported manifest");
        Ok(root)
    }

    /// Fetch the contents of the blob identified by `blob_id`.
    ///
    /// The identity is translated back to its `(path, rev)` pair, which
    /// is what the helper understands. The whole file arrives as a
    /// single chunk; the helper never continues a `CAT_FILE` response.
    pub fn import_file_contents(&mut self, blob_id: Hash) -> Result<Vec<u8>> {
        let info = self.blobs.get(blob_id)?;
        debug!(path = %info.path, rev = %info.rev, "requesting file contents");

        self.channel
            .send_request(CMD_CAT_FILE, &[info.rev.as_bytes(), info.path.as_bytes()])?;

        let header = self.channel.read_header()?;
        if header.has_more_chunks() {
            return Err(ImportError::Protocol(
                "chunked CAT_FILE response is not supported".to_string(),
            ));
        }

        let mut contents = Vec::new();
        self.channel
            .read_body_into(&mut contents, header.data_length as usize)?;
        Ok(contents)
    }

    /// Parse one manifest entry off the front of `cursor` and register
    /// it with the assembler.
    ///
    /// Wire form: `rev[20] '\t' [flag '\t']? path '\0'`. A `'\t'` in
    /// the flag position means the entry has no flag byte at all.
    fn read_manifest_entry(
        &mut self,
        assembler: &mut ManifestAssembler,
        cursor: &mut &[u8],
    ) -> Result<()> {
        let rev_bytes = take_bytes(cursor, Hash::RAW_SIZE)?;
        let file_rev = Hash::from_bytes(rev_bytes)
            .map_err(|e| ImportError::Protocol(e.to_string()))?;

        let sep = take_byte(cursor)?;
        if sep != b'\t' {
            return Err(ImportError::Protocol(format!(
                "unexpected separator byte: {sep:#04x}"
            )));
        }

        let mut flag = take_byte(cursor)?;
        if flag == b'\t' {
            flag = b' ';
        } else {
            let sep = take_byte(cursor)?;
            if sep != b'\t' {
                return Err(ImportError::Protocol(format!(
                    "unexpected separator byte: {sep:#04x}"
                )));
            }
        }

        let terminator = cursor
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ImportError::Protocol("unterminated path".to_string()))?;
        let path_bytes = &cursor[..terminator];
        *cursor = &cursor[terminator + 1..];

        let path_str = std::str::from_utf8(path_bytes)
            .map_err(|e| ImportError::Protocol(format!("path is not valid UTF-8: {e}")))?;
        let path = RelativePath::new(path_str)
            .map_err(|e| ImportError::Protocol(e.to_string()))?;

        let (file_type, owner_permissions) = match flag {
            b' ' => (FileType::Regular, 0b110),
            b'x' => (FileType::Executable, 0b111),
            b'l' => (FileType::Symlink, 0b111),
            other => {
                return Err(ImportError::Protocol(format!(
                    "unsupported file flag {other:#04x} for {path}"
                )))
            }
        };

        let blob_id = self.blobs.put(path, file_rev)?;
        let entry = TreeEntry::new(blob_id, path.basename(), file_type, owner_permissions);
        assembler.process_entry(path.dirname(), entry);
        Ok(())
    }
}

impl<R, W> Drop for ScmImporter<R, W> {
    fn drop(&mut self) {
        if let Some(mut child) = self.helper.take() {
            // Closing the helper's stdin tells it to exit; reap it so
            // no zombie is left behind.
            self.channel.close_writer();
            if let Err(e) = child.wait() {
                warn!(error = %e, "failed to wait for SCM helper");
            }
        }
    }
}

fn take_bytes<'a>(cursor: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if cursor.len() < n {
        return Err(ImportError::Protocol(format!(
            "manifest entry truncated: wanted {n} bytes, {} left",
            cursor.len()
        )));
    }
    let (taken, rest) = cursor.split_at(n);
    *cursor = rest;
    Ok(taken)
}

fn take_byte(cursor: &mut &[u8]) -> Result<u8> {
    Ok(take_bytes(cursor, 1)?[0])
}
