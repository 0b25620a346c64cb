use std::fs;
use std::io::Write;
use std::path::Path;

use log::info;
use tempfile::NamedTempFile;

use crate::engine::AggregateResult;
use crate::error::SinkError;
use crate::store::ArtifactPaths;
use crate::store::sink::{ResultSink, render_mailbox_list, render_records};

/// Plain-text artifacts on the local filesystem.
pub struct FileSink {
    paths: ArtifactPaths,
}

impl FileSink {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self { paths }
    }
}

impl ResultSink for FileSink {
    fn write_mailbox_list(&self, mailboxes: &[String]) -> Result<(), SinkError> {
        write_atomically(&self.paths.mailbox_list, &render_mailbox_list(mailboxes))?;
        info!(
            "wrote {} mailbox names to {}",
            mailboxes.len(),
            self.paths.mailbox_list.display()
        );
        Ok(())
    }

    fn write_result(&self, result: &AggregateResult) -> Result<(), SinkError> {
        self.write_mailbox_list(&result.mailbox_list)?;
        write_atomically(&self.paths.messages, &render_records(&result.records))?;
        info!(
            "wrote {} records to {}",
            result.records.len(),
            self.paths.messages.display()
        );
        Ok(())
    }
}

/// Write to a temporary file next to `path`, then rename it into place.
pub fn write_atomically(path: &Path, contents: &str) -> Result<(), SinkError> {
    let err = |source| SinkError {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(err)?;
    tmp.write_all(contents.as_bytes()).map_err(err)?;
    tmp.as_file().sync_all().map_err(err)?;
    tmp.persist(path).map_err(|e| err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::MessageRecord;

    fn paths(dir: &Path) -> ArtifactPaths {
        ArtifactPaths {
            messages: dir.join("out/mails.txt"),
            mailbox_list: dir.join("out/mailboxes.txt"),
        }
    }

    fn result() -> AggregateResult {
        AggregateResult {
            records: vec![MessageRecord {
                mailbox: "INBOX".into(),
                uid: 1,
                subject: "hi".into(),
                sender: "a@b.c".into(),
                recipients: vec!["x@y.com".into()],
                received_at: None,
                body: "body".into(),
            }],
            mailbox_list: vec!["INBOX".into(), "Archive".into()],
            failures: vec![],
        }
    }

    #[test]
    fn writes_both_artifacts_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(paths(dir.path()));
        sink.write_result(&result()).unwrap();

        let list = fs::read_to_string(dir.path().join("out/mailboxes.txt")).unwrap();
        assert_eq!(list, "INBOX\nArchive\n");
        let mails = fs::read_to_string(dir.path().join("out/mails.txt")).unwrap();
        assert!(mails.starts_with("Mailbox: INBOX\nUID: 1\n"));
    }

    #[test]
    fn empty_result_still_writes_empty_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(paths(dir.path()));
        sink.write_result(&AggregateResult::default()).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("out/mails.txt")).unwrap(), "");
    }

    #[test]
    fn rewrite_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.txt");
        write_atomically(&target, "first version, longer\n").unwrap();
        write_atomically(&target, "second\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "second\n");
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is needed.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let target = blocker.join("mails.txt");

        let e = write_atomically(&target, "data").unwrap_err();
        assert_eq!(e.path, target);
        assert!(!target.exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn target_that_is_a_directory_is_not_clobbered() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("taken");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep.txt"), "keep").unwrap();

        assert!(write_atomically(&target, "data").is_err());
        assert_eq!(fs::read_to_string(target.join("keep.txt")).unwrap(), "keep");
        // The temporary file was cleaned up on drop.
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("taken")]);
    }
}
