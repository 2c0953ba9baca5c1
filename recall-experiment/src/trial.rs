use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;
use recall_core::{QUESTIONS_PER_TRIAL, Question, QuestionType, Trial};
use tracing::{info, warn};

use crate::error::BuildError;
use crate::images::ImageResolver;
use crate::schema::{QuestionColumns, Schema};
use crate::table::{Row, StimulusTable};

/// Stand-in questions for rows whose sheet has no usable question text.
const PLACEHOLDER_QUESTIONS: [(&str, QuestionType); QUESTIONS_PER_TRIAL] = [
    ("מהו המסר המרכזי של הגרף?", QuestionType::Content),
    ("איזו קטגוריה גבוהה יותר?", QuestionType::Content),
    ("איזה צבע הופיע בגרף?", QuestionType::Color),
];

const OPTION_COUNT: usize = 4;

/// Turns the raw stimulus table into the session's immutable trial list.
#[derive(Debug, Clone)]
pub struct TrialBuilder {
    max_trials: usize,
    shuffle: bool,
    images: ImageResolver,
}

impl TrialBuilder {
    pub fn new(max_trials: usize, shuffle: bool, images: ImageResolver) -> Self {
        Self {
            max_trials,
            shuffle,
            images,
        }
    }

    /// Caps the table to its first `max_trials` rows, then shuffles them if
    /// asked. Bad rows degrade to placeholder content.
    pub fn build<R: Rng + ?Sized>(
        &self,
        table: &StimulusTable,
        rng: &mut R,
    ) -> Result<Vec<Trial>, BuildError> {
        if table.is_empty() {
            return Err(BuildError::Empty);
        }
        let (schema, warnings) = Schema::resolve(table.headers());
        for w in &warnings {
            warn!("{w}");
        }

        let mut rows: Vec<Row<'_>> = table.rows().take(self.max_trials).collect();
        if self.shuffle {
            rows.shuffle(rng);
        }

        let trials: Vec<Trial> = rows
            .iter()
            .enumerate()
            .map(|(index, row)| self.build_trial(index, row, table.headers(), &schema))
            .collect();

        info!(
            trials = trials.len(),
            rows = table.len(),
            shuffled = self.shuffle,
            "trial sequence built"
        );
        Ok(trials)
    }

    fn build_trial(&self, index: usize, row: &Row<'_>, headers: &[String], schema: &Schema) -> Trial {
        let image_ref = self.images.pick(&schema.image_candidates(row));
        if image_ref.is_none() {
            warn!(row = row.index(), "no usable image reference; showing placeholder");
        }

        let questions = (1..=QUESTIONS_PER_TRIAL)
            .map(|n| match schema.questions.iter().find(|c| c.number == n) {
                Some(cols) => question_from_row(cols, row),
                None => placeholder(n - 1),
            })
            .collect();

        let mut metadata: BTreeMap<String, String> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.is_empty())
            .map(|(i, h)| (h.clone(), row.raw(i).to_string()))
            .collect();
        metadata.insert(
            "color_value".to_string(),
            schema.color(row).unwrap_or_default().to_string(),
        );

        Trial {
            index,
            source_row: row.index(),
            context_text: schema.context(row).unwrap_or_default().to_string(),
            image_ref,
            questions,
            metadata,
        }
    }
}

fn placeholder(slot: usize) -> Question {
    let (text, kind) = PLACEHOLDER_QUESTIONS[slot % QUESTIONS_PER_TRIAL];
    Question {
        text: text.to_string(),
        options: Vec::new(),
        correct_answer: None,
        kind,
    }
}

fn question_from_row(cols: &QuestionColumns, row: &Row<'_>) -> Question {
    let slot = cols.number - 1;
    let Some(text) = cols.text(row) else {
        warn!(row = row.index(), question = cols.number, "empty question text; using placeholder");
        return placeholder(slot);
    };

    let mut options: Vec<String> = cols.options(row).into_iter().map(str::to_string).collect();
    if !options.is_empty() && options.len() != OPTION_COUNT {
        warn!(
            row = row.index(),
            question = cols.number,
            found = options.len(),
            "expected 0 or 4 answer options; asking as an open question"
        );
        options.clear();
    }

    Question {
        text: text.to_string(),
        options,
        correct_answer: cols.correct(row).map(str::to_string),
        kind: QuestionType::classify(text, cols.kind(row)),
    }
}
