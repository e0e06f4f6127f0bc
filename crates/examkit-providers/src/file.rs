//! Local file backends: TOML question banks and a JSON result directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use examkit_core::model::{Question, QuestionBank, QuestionSet, TestSelection, TestType};
use examkit_core::parser::load_bank_directory;
use examkit_core::report::AttemptRecord;
use examkit_core::traits::{ContentProvider, ResultStore};

use crate::error::ProviderError;

/// Serves question sets from a directory of TOML banks.
pub struct FileContentProvider {
    dir: PathBuf,
}

impl FileContentProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ContentProvider for FileContentProvider {
    fn name(&self) -> &str {
        "file"
    }

    #[instrument(skip(self, selection), fields(subject = %selection.subject, test_type = %selection.config.test_type))]
    async fn fetch_question_set(
        &self,
        selection: &TestSelection,
    ) -> Result<QuestionSet, ProviderError> {
        let dir = self.dir.clone();
        let banks = tokio::task::spawn_blocking(move || load_bank_directory(&dir))
            .await
            .map_err(|e| ProviderError::Io(e.to_string()))?
            .map_err(|e| ProviderError::Unavailable(format!("{e:#}")))?;

        debug!(banks = banks.len(), "loaded question banks");
        select_questions(&banks, selection)
    }
}

/// Pick questions for a selection.
///
/// Quick and subject tests take the first `question_count` questions of the
/// matching bank. Mock exams interleave all banks round-robin. Questions
/// without a topic are tagged with their bank's subject.
pub fn select_questions(
    banks: &[QuestionBank],
    selection: &TestSelection,
) -> Result<QuestionSet, ProviderError> {
    let count = selection.config.question_count;

    let questions: Vec<Question> = match selection.config.test_type {
        TestType::Quick | TestType::Subject => {
            let bank = banks
                .iter()
                .find(|b| b.subject.eq_ignore_ascii_case(&selection.subject))
                .ok_or_else(|| ProviderError::NotFound(format!("subject '{}'", selection.subject)))?;
            bank.questions
                .iter()
                .take(count)
                .map(|q| tagged(q, bank))
                .collect()
        }
        TestType::Mock => {
            let longest = banks.iter().map(|b| b.questions.len()).max().unwrap_or(0);
            (0..longest)
                .flat_map(move |i| {
                    banks
                        .iter()
                        .filter_map(move |b| b.questions.get(i).map(|q| tagged(q, b)))
                })
                .take(count)
                .collect()
        }
    };

    Ok(QuestionSet::new(selection.subject.clone(), questions)?)
}

fn tagged(question: &Question, bank: &QuestionBank) -> Question {
    let mut q = question.clone();
    if q.topic.trim().is_empty() {
        q.topic = bank.subject.clone();
    }
    q
}

/// Stores each attempt as a pretty-printed JSON file in a directory.
///
/// Writes go to a temporary file first and are renamed into place, so
/// retrying the same record overwrites rather than duplicates.
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path the record is (or would be) stored at.
    pub fn path_for(&self, record: &AttemptRecord) -> PathBuf {
        self.dir.join(record.file_name())
    }
}

#[async_trait]
impl ResultStore for JsonDirStore {
    fn name(&self) -> &str {
        "json"
    }

    #[instrument(skip(self, record), fields(session = %record.id))]
    async fn persist(&self, record: &AttemptRecord) -> Result<(), ProviderError> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| ProviderError::InvalidContent(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(record);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), "attempt written");
        Ok(())
    }
}
