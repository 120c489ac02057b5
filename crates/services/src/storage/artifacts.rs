use std::io;
use std::path::{Path, PathBuf};

use bson::oid::ObjectId;
use tracing::debug;

use bhasha_config::StorageSettings;

/// Durable output store. Every write is keyed on the job id with
/// overwrite semantics, so an at-least-once redelivery re-produces the
/// same files instead of appending.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(settings: &StorageSettings) -> io::Result<Self> {
        let store = Self {
            output_dir: PathBuf::from(&settings.output_dir),
            scratch_dir: PathBuf::from(&settings.scratch_dir),
        };
        std::fs::create_dir_all(&store.output_dir)?;
        std::fs::create_dir_all(&store.scratch_dir)?;
        Ok(store)
    }

    /// Directory holding per-stage scratch workspaces; everything under
    /// it is temporary and owned by a running pipeline.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn job_dir(&self, job_id: ObjectId) -> PathBuf {
        self.output_dir.join(job_id.to_hex())
    }

    pub fn save_transcript(&self, job_id: ObjectId, text: &str) -> io::Result<PathBuf> {
        self.write(job_id, "transcript.txt", text.as_bytes())
    }

    pub fn save_translation(
        &self,
        job_id: ObjectId,
        language: &str,
        record: &serde_json::Value,
    ) -> io::Result<PathBuf> {
        let body = serde_json::to_vec_pretty(record)?;
        self.write(job_id, &format!("translation_{language}.json"), &body)
    }

    pub fn save_manifest(&self, job_id: ObjectId, manifest: &serde_json::Value) -> io::Result<PathBuf> {
        let body = serde_json::to_vec_pretty(manifest)?;
        self.write(job_id, "manifest.json", &body)
    }

    /// Moves a finished synthesis scratch file into the job directory.
    /// The only file surviving pipeline completion.
    pub fn persist_audio(
        &self,
        job_id: ObjectId,
        language: &str,
        scratch: &Path,
    ) -> io::Result<PathBuf> {
        let dir = self.job_dir(job_id);
        std::fs::create_dir_all(&dir)?;
        let target = dir.join(format!("tts_{language}.wav"));
        // Rename when possible, copy across filesystems.
        if std::fs::rename(scratch, &target).is_err() {
            std::fs::copy(scratch, &target)?;
            std::fs::remove_file(scratch).ok();
        }
        debug!(job_id = %job_id, path = %target.display(), "Audio artifact persisted");
        Ok(target)
    }

    fn write(&self, job_id: ObjectId, name: &str, body: &[u8]) -> io::Result<PathBuf> {
        let dir = self.job_dir(job_id);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(name);
        std::fs::write(&path, body)?;
        debug!(job_id = %job_id, path = %path.display(), "Artifact written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ArtifactStore {
        ArtifactStore::new(&StorageSettings {
            upload_dir: dir.path().join("uploads").display().to_string(),
            output_dir: dir.path().join("outputs").display().to_string(),
            scratch_dir: dir.path().join("scratch").display().to_string(),
            vocab_dir: dir.path().join("vocabs").display().to_string(),
        })
        .unwrap()
    }

    #[test]
    fn writes_are_overwrite_not_append() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let job_id = ObjectId::new();

        let first = store.save_transcript(job_id, "first run").unwrap();
        let second = store.save_transcript(job_id, "second run").unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(second).unwrap(), "second run");
    }

    #[test]
    fn persisted_audio_leaves_no_scratch_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let job_id = ObjectId::new();

        let scratch = store.scratch_dir().join("synthesis.wav");
        std::fs::write(&scratch, b"RIFF").unwrap();

        let target = store.persist_audio(job_id, "hi", &scratch).unwrap();
        assert!(target.ends_with(format!("{}/tts_hi.wav", job_id.to_hex())));
        assert!(target.exists());
        assert!(!scratch.exists());
    }
}
