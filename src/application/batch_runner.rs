// ============================================================
// Layer 2 — Batch Runner
// ============================================================
// Walks the note table group by group:
//
//   Step 1: collect rows with no response yet
//   Step 2: split them into groups of `batch_size`
//   Step 3: per group: build prompts, ONE generation call,
//           clean + validate + classify every output
//   Step 4: a failed call marks the whole group ERROR;
//           the run moves on to the next group
//   Step 5: checkpoint the full table every N groups
//   Step 6: final table + error report
//
// Strictly sequential: a group's call finishes before the next
// group is built. Rows only ever move from Unprocessed to a
// terminal status; nothing is retried within a run.
//
// Reference: Rust Book §13 (Iterators: chunks, zip)

use anyhow::Result;
use std::time::{Duration, Instant};

use crate::data::dataset::NoteDataset;
use crate::data::postprocess::OutputValidator;
use crate::data::prompt::PromptBuilder;
use crate::domain::error::InferenceError;
use crate::domain::record::{ErrorRecord, Status};
use crate::domain::traits::{InferenceService, PostBatchHook, TokenCodec};
use crate::infra::checkpoint::TableStore;
use crate::infra::metrics::{BatchMetrics, MetricsLogger, StatusCounts};
use crate::ml::inferencer::Inferencer;

/// Loop settings
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Records per generation call
    pub batch_size:       usize,
    /// Save the table after every this many groups
    pub checkpoint_every: usize,
    /// Sections required for FULL
    pub min_sections:     usize,
    pub max_new_tokens:   usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_size:       8,
            checkpoint_every: 1,
            min_sections:     4,
            max_new_tokens:   2048,
        }
    }
}

/// What a run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Groups sent to the model in this run
    pub groups:    usize,
    /// Records attempted in this run
    pub attempted: usize,
    /// Status counts over the whole table at the end
    pub counts:    StatusCounts,
    /// Rows in the error report
    pub errors:    usize,
    /// Prompts whose note (or whole sequence) had to be cut
    pub truncated: usize,
    pub elapsed:   Duration,
}

pub struct BatchRunner<'a> {
    config:     RunnerConfig,
    builder:    &'a PromptBuilder,
    codec:      &'a dyn TokenCodec,
    inferencer: Inferencer<'a>,
    validator:  OutputValidator,
    store:      &'a TableStore,
    hook:       Option<&'a mut dyn PostBatchHook>,
    metrics:    Option<MetricsLogger>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        config:  RunnerConfig,
        builder: &'a PromptBuilder,
        codec:   &'a dyn TokenCodec,
        service: &'a mut dyn InferenceService,
        store:   &'a TableStore,
    ) -> Self {
        Self {
            config,
            builder,
            codec,
            inferencer: Inferencer::new(service, codec, config.max_new_tokens),
            validator:  OutputValidator::new(config.min_sections),
            store,
            hook:       None,
            metrics:    None,
        }
    }

    /// Run `hook` after every group
    pub fn with_hook(mut self, hook: &'a mut dyn PostBatchHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Append per-group progress rows to `metrics`
    pub fn with_metrics(mut self, metrics: MetricsLogger) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Process every pending record of `table` in place.
    ///
    /// Only storage failures end the run early; inference and
    /// validation failures are recorded per record.
    pub fn run(&mut self, table: &mut NoteDataset) -> Result<RunSummary> {
        let started    = Instant::now();
        let total      = table.len();
        let pending    = table.pending_indices();
        let batch_size = self.config.batch_size.max(1);
        let every      = self.config.checkpoint_every.max(1);

        if table.is_empty() {
            tracing::warn!("Input table has no rows, nothing to do");
        }
        tracing::info!(
            "{} of {} rows pending, batch size {}",
            pending.len(),
            total,
            batch_size
        );

        let mut errors    = Vec::new();
        let mut groups    = 0usize;
        let mut truncated = 0usize;
        // A FAIL row can come back with an empty response, so progress
        // counts attempts instead of non-empty responses
        let mut completed = total - pending.len();

        for group in pending.chunks(batch_size) {
            groups += 1;

            completed += group.len();

            match self.run_group(table, group, &mut truncated) {
                Ok(outputs) => {
                    for (&index, output) in group.iter().zip(outputs) {
                        let (matched, valid) = self.validator.score(&output);
                        let status = Status::classify(matched, valid);
                        if status == Status::Fail {
                            errors.push(ErrorRecord::new(index, condition_of(table, index), output.clone()));
                        }
                        tracing::debug!("Row {}: {} ({} sections)", index, status, matched);
                        table.set_result(index, output, status);
                    }
                }
                Err(e) => {
                    tracing::warn!("Group {} ({} rows) failed: {}", groups, group.len(), e);
                    for &index in group {
                        errors.push(ErrorRecord::new(index, condition_of(table, index), e.to_string()));
                        table.set_result(index, format!("[ERROR] {e}"), Status::Error);
                    }
                }
            }

            if let Some(hook) = self.hook.as_mut() {
                hook.after_batch(groups);
            }

            let elapsed = started.elapsed().as_secs_f64();
            println!("Completed {}/{} rows, elapsed {:.2}s", completed, total, elapsed);

            if let Some(metrics) = &self.metrics {
                let m = BatchMetrics {
                    batch:        groups,
                    completed,
                    total,
                    elapsed_secs: elapsed,
                    counts:       StatusCounts::of(table),
                };
                if let Err(e) = metrics.log(&m) {
                    tracing::warn!("Cannot write progress metrics: {e}");
                }
            }

            if groups % every == 0 {
                self.store.save_table(table)?;
            }
        }

        self.store.save_table(table)?;
        self.store.save_errors(&errors)?;

        let summary = RunSummary {
            groups,
            attempted: pending.len(),
            counts:    StatusCounts::of(table),
            errors:    errors.len(),
            truncated,
            elapsed:   started.elapsed(),
        };
        tracing::info!("Run finished: {:?}", summary);
        Ok(summary)
    }

    /// Build prompts for one group and generate.
    /// Cut prompts are added to `truncated`.
    fn run_group(
        &mut self,
        table:     &NoteDataset,
        group:     &[usize],
        truncated: &mut usize,
    ) -> Result<Vec<String>, InferenceError> {
        let mut prompts = Vec::with_capacity(group.len());
        for &index in group {
            let prompt = self.builder.build(self.codec, &condition_of(table, index))?;
            if prompt.was_truncated() {
                *truncated += 1;
            }
            prompts.push(prompt.input_ids);
        }

        self.inferencer.generate(prompts)
    }
}

/// Raw note of a record, looked up by its own index
fn condition_of(table: &NoteDataset, index: usize) -> String {
    table
        .get(index)
        .map(|r| r.patient_condition.clone())
        .unwrap_or_default()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::CONDITION_COLUMN;
    use crate::data::loader::{overlay_prior_output, CsvLoader};
    use crate::data::prompt::{PromptLimits, PromptTemplate};
    use crate::domain::record::Record;
    use crate::testing::{full_template_reply, CharCodec, EchoService, ScriptedService};
    use std::fs;
    use std::path::Path;

    fn builder() -> PromptBuilder {
        let limits = PromptLimits { max_input_tokens: 200, context_window: 400, max_new_tokens: 100 };
        PromptBuilder::new(&PromptTemplate::new("SYS", "P:", "|END"), &CharCodec, limits).unwrap()
    }

    fn config(batch_size: usize) -> RunnerConfig {
        RunnerConfig { batch_size, checkpoint_every: 1, min_sections: 4, max_new_tokens: 100 }
    }

    fn table(notes: &[&str]) -> NoteDataset {
        let records = notes
            .iter()
            .enumerate()
            .map(|(i, n)| Record::new(i, vec![n.to_string()], *n))
            .collect();
        NoteDataset::new(vec![CONDITION_COLUMN.into()], records)
    }

    fn store(dir: &Path) -> TableStore {
        TableStore::new(dir.join("out.csv"), dir.join("errors.csv")).unwrap()
    }

    #[test]
    fn test_full_template_reply_is_full() {
        let dir       = tempfile::tempdir().unwrap();
        let store     = store(dir.path());
        let b         = builder();
        let mut svc   = EchoService::new(full_template_reply());
        let mut t     = table(&["空腹血糖 7.2, 餐后 9.1, 血压 130/85"]);

        let summary = BatchRunner::new(config(8), &b, &CharCodec, &mut svc, &store)
            .run(&mut t)
            .unwrap();

        let r = t.get(0).unwrap();
        assert_eq!(r.status, Status::Full);
        for header in crate::data::postprocess::REQUIRED_SECTIONS {
            assert!(r.response.contains(header));
        }
        // reasoning trace gone
        assert!(r.response.starts_with("1. **血糖控制**"));
        assert_eq!(summary.counts.full, 1);
        assert_eq!(summary.errors, 0);
        assert!(!store.errors_path().exists());
    }

    #[test]
    fn test_group_failure_only_hits_that_group() {
        let dir   = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let b     = builder();
        let full  = full_template_reply();
        let mut svc = ScriptedService::new(vec![
            Ok(vec![full.clone(), full.clone()]),
            Err("CUDA out of memory".into()),
            Ok(vec![full.clone(), full.clone()]),
        ]);
        let mut t = table(&["a", "b", "c", "d", "e", "f"]);

        let summary = BatchRunner::new(config(2), &b, &CharCodec, &mut svc, &store)
            .run(&mut t)
            .unwrap();

        let statuses: Vec<Status> = t.records().iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![Status::Full, Status::Full, Status::Error, Status::Error, Status::Full, Status::Full]
        );
        assert!(t.get(2).unwrap().response.starts_with("[ERROR] "));
        assert!(t.get(2).unwrap().response.contains("CUDA out of memory"));
        assert_eq!(summary.groups, 3);
        assert_eq!(summary.errors, 2);

        let report = fs::read_to_string(store.errors_path()).unwrap();
        assert!(report.starts_with("index,prompt,error\n"));
        assert!(report.contains("2,c,"));
        assert!(report.contains("3,d,"));
    }

    #[test]
    fn test_partial_and_fail_classification() {
        let dir   = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let b     = builder();
        let mut svc = ScriptedService::new(vec![Ok(vec![
            "**血糖控制**\n**血压管理**\n**生活方式**".into(),
            "无法提取".into(),
        ])]);
        let mut t = table(&["note-a", "note-b"]);

        BatchRunner::new(config(8), &b, &CharCodec, &mut svc, &store)
            .run(&mut t)
            .unwrap();

        assert_eq!(t.get(0).unwrap().status, Status::Partial(3));
        assert_eq!(t.get(1).unwrap().status, Status::Fail);

        // FAIL rows are reported with the model output as the error
        let report = fs::read_to_string(store.errors_path()).unwrap();
        assert!(report.contains("1,note-b,无法提取"));
    }

    #[test]
    fn test_error_records_use_the_records_own_note() {
        let dir   = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let b     = builder();
        let mut svc = ScriptedService::new(vec![Ok(vec!["x".into(), "y".into()])]);
        let mut t = table(&["first", "second", "third", "fourth"]);
        // rows 0 and 2 were done in an earlier run
        t.set_result(0, "done", Status::Full);
        t.set_result(2, "done", Status::Full);

        BatchRunner::new(config(8), &b, &CharCodec, &mut svc, &store)
            .run(&mut t)
            .unwrap();

        let report = fs::read_to_string(store.errors_path()).unwrap();
        assert!(report.contains("1,second,x"));
        assert!(report.contains("3,fourth,y"));
    }

    #[test]
    fn test_second_run_makes_no_calls_and_keeps_output() {
        let dir   = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        fs::write(&input, "patient_condition\n甲\n乙\n丙\n").unwrap();
        let store = store(dir.path());
        let b     = builder();

        let mut first = EchoService::new(full_template_reply());
        let mut t1    = CsvLoader::new(&input).load().unwrap();
        overlay_prior_output(&mut t1, store.output_path()).unwrap();
        BatchRunner::new(config(2), &b, &CharCodec, &mut first, &store)
            .run(&mut t1)
            .unwrap();
        assert_eq!(first.calls, 2);
        let after_first = fs::read(store.output_path()).unwrap();

        let mut second = EchoService::new("should never be used");
        let mut t2     = CsvLoader::new(&input).load().unwrap();
        overlay_prior_output(&mut t2, store.output_path()).unwrap();
        let summary = BatchRunner::new(config(2), &b, &CharCodec, &mut second, &store)
            .run(&mut t2)
            .unwrap();

        assert_eq!(second.calls, 0);
        assert_eq!(summary.attempted, 0);
        assert_eq!(fs::read(store.output_path()).unwrap(), after_first);
    }

    #[test]
    fn test_checkpoint_written_after_each_group() {
        let dir   = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let b     = builder();
        let full  = full_template_reply();
        // second group fails, but the first group's checkpoint is already on disk
        let mut svc = ScriptedService::new(vec![Ok(vec![full.clone()]), Err("boom".into())]);
        let mut t   = table(&["a", "b"]);

        struct Probe<'p> {
            path: &'p Path,
            seen: Vec<bool>,
        }
        impl PostBatchHook for Probe<'_> {
            fn after_batch(&mut self, _batch_no: usize) {
                self.seen.push(self.path.exists());
            }
        }
        let mut probe = Probe { path: store.output_path(), seen: Vec::new() };

        BatchRunner::new(config(1), &b, &CharCodec, &mut svc, &store)
            .with_hook(&mut probe)
            .run(&mut t)
            .unwrap();

        // hook runs before the group's checkpoint: nothing on disk
        // after group 1, group 1's checkpoint visible after group 2
        assert_eq!(probe.seen, vec![false, true]);

        let mut reloaded = table(&["a", "b"]);
        overlay_prior_output(&mut reloaded, store.output_path()).unwrap();
        assert_eq!(reloaded.get(0).unwrap().status, Status::Full);
        assert_eq!(reloaded.get(1).unwrap().status, Status::Error);
    }

    #[test]
    fn test_zero_min_sections_still_fails_headerless_output() {
        let dir   = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let b     = builder();
        let mut svc = ScriptedService::new(vec![Ok(vec!["think</think>\n".into(), "".into()])]);
        let mut t   = table(&["a", "b"]);
        let cfg     = RunnerConfig { min_sections: 0, ..config(8) };

        let summary = BatchRunner::new(cfg, &b, &CharCodec, &mut svc, &store)
            .run(&mut t)
            .unwrap();

        assert_eq!(t.get(0).unwrap().status, Status::Fail);
        assert_eq!(t.get(1).unwrap().status, Status::Fail);
        assert_eq!(summary.counts.full, 0);
        assert_eq!(summary.errors, 2);
    }

    #[test]
    fn test_progress_counts_rows_with_empty_fail_output() {
        let dir   = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let b     = builder();
        let mut svc = ScriptedService::new(vec![Ok(vec!["".into()]), Ok(vec!["".into()])]);
        let mut t   = table(&["a", "b", "c"]);
        t.set_result(0, "done", Status::Full);

        BatchRunner::new(config(1), &b, &CharCodec, &mut svc, &store)
            .with_metrics(MetricsLogger::new(dir.path()).unwrap())
            .run(&mut t)
            .unwrap();

        // both attempted rows stay unprocessed (empty response) but are counted
        assert_eq!(t.processed_count(), 1);
        let log = fs::read_to_string(dir.path().join("progress.csv")).unwrap();
        let completed: Vec<&str> = log
            .lines()
            .skip(1)
            .map(|l| l.split(',').nth(1).unwrap())
            .collect();
        assert_eq!(completed, vec!["2", "3"]);
    }

    #[test]
    fn test_truncated_prompts_are_counted() {
        let dir   = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let b     = builder();
        let mut svc = EchoService::new(full_template_reply());
        let long    = "长".repeat(500);
        let mut t   = table(&["short", long.as_str(), "also short"]);

        let summary = BatchRunner::new(config(8), &b, &CharCodec, &mut svc, &store)
            .run(&mut t)
            .unwrap();

        assert_eq!(summary.truncated, 1);
        assert_eq!(summary.attempted, 3);
    }

    #[test]
    fn test_groups_are_left_padded_to_longest_prompt() {
        let dir   = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let b     = builder();
        let mut svc = ScriptedService::new(vec![Ok(vec!["r".into(), "r".into()])]);
        let mut t   = table(&["ab", "abcdef"]);

        BatchRunner::new(config(2), &b, &CharCodec, &mut svc, &store)
            .run(&mut t)
            .unwrap();

        // 9 template tokens + longest body of 6
        assert_eq!(svc.widths, vec![15]);
        assert_eq!(t.get(0).unwrap().response, "r");
    }
}
