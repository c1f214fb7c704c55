//! Script runner: command lines and data blocks in one CSV file.
//!
//! A script is CSV rows. A row that is not data assembles into a command
//! line: a row ending in `...` continues onto the next row, a row
//! starting with `|` buffers itself in front of the pending line, and any
//! other non-blank row completes the line and starts its data block. The
//! block's rows stream through the decoder and every record runs through
//! the line's command chain until the blank-row sentinel.

use std::io::Read;

use serde::Serialize;

use crate::api::logs::{log_error, log_info};
use crate::command::args::split_quoted;
use crate::command::{CommandRegistry, Exchange, ImportCommand, SharedInstance};
use crate::decode::{decode_block, ValueTransform};
use crate::error::{DecodeError, ImpexError, ImpexResult, ScriptError};
use crate::model::ModelRegistry;

/// What a script run did, for user-visible reporting.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSummary {
    pub blocks: usize,
    pub records: usize,
    pub errors: usize,
}

/// Runs impex scripts against a command registry and a model registry.
pub struct ScriptRunner<'a> {
    commands: &'a CommandRegistry,
    models: &'a ModelRegistry,
    transform: Option<&'a dyn ValueTransform>,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(commands: &'a CommandRegistry, models: &'a ModelRegistry) -> Self {
        ScriptRunner {
            commands,
            models,
            transform: None,
        }
    }

    /// Install a template hook applied to cell values during decode.
    pub fn with_transform(mut self, transform: &'a dyn ValueTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Run a whole script. The first failing block aborts the run.
    pub fn run_script<R: Read>(&self, reader: R) -> ImpexResult<ScriptSummary> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut rows = csv_reader.records();

        let mut summary = ScriptSummary::default();
        let mut pending = String::new();
        let mut appending = false;

        while let Some(row) = rows.next() {
            let row = row.map_err(DecodeError::from)?;

            // cells join into one line; non-first cells with spaces keep
            // their grouping through re-quoting
            let mut cells = Vec::with_capacity(row.len());
            for (idx, cell) in row.iter().enumerate() {
                let cell = cell.trim();
                if idx != 0 && cell.contains(' ') {
                    cells.push(format!("\"{}\"", cell.replace('"', "\\\"")));
                } else {
                    cells.push(cell.to_string());
                }
            }
            let line = cells.join(" ").trim().to_string();

            if line.is_empty() {
                continue;
            }

            if line.starts_with('|') && !appending {
                pending = format!("{line} {pending}").trim().to_string();
                continue;
            }

            if let Some(stripped) = line.strip_suffix("...") {
                pending = format!("{pending} {}", stripped.trim())
                    .trim()
                    .to_string();
                appending = true;
                continue;
            }

            let command_line = if appending {
                format!("{pending} {line}")
            } else {
                format!("{line} {pending}")
            };
            let command_line = command_line.trim().to_string();
            pending.clear();
            appending = false;

            self.run_block(&command_line, &mut rows, &mut summary)?;
        }

        Ok(summary)
    }

    /// Run one data block under a single import command, without script
    /// parsing. Used by the per-model import surface.
    pub fn run_command<R: Read>(
        &self,
        command_line: &str,
        reader: R,
    ) -> ImpexResult<ScriptSummary> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut rows = csv_reader.records();
        let mut summary = ScriptSummary::default();
        self.run_block(command_line, &mut rows, &mut summary)?;
        Ok(summary)
    }

    fn run_block<I>(
        &self,
        command_line: &str,
        rows: &mut I,
        summary: &mut ScriptSummary,
    ) -> ImpexResult<()>
    where
        I: Iterator<Item = Result<csv::StringRecord, csv::Error>>,
    {
        log_info(format!("Command line: {command_line}"));

        // fresh exchange per script line
        let mut exchange = Exchange::new();
        let mut chain: Vec<Box<dyn ImportCommand>> = Vec::new();

        for stage in split_quoted(command_line, &['|']) {
            let tokens = split_quoted(stage.trim(), &[' ', '\n', '\t']);
            let Some(name) = tokens.first() else { continue };

            let mut command = self
                .commands
                .create(name)
                .ok_or_else(|| ScriptError::UnknownCommand(name.clone()))?;
            command
                .init(&tokens, self.models, &mut exchange)
                .map_err(ScriptError::Init)?;
            chain.push(command);
        }

        if chain.is_empty() {
            return Err(ScriptError::EmptyChain.into());
        }

        let mut records = 0usize;
        let mut errors = 0usize;

        decode_block(rows, self.transform, |record| {
            records += 1;
            let mut input: Option<SharedInstance> = None;
            for command in chain.iter_mut() {
                match command.process(&record, input.take(), &mut exchange) {
                    Ok(output) => input = output,
                    Err(err) => {
                        errors += 1;
                        log_error(format!("record {records}: {err}"));
                        break;
                    }
                }
            }
            true
        })?;

        summary.blocks += 1;
        summary.records += records;
        summary.errors += errors;

        if errors > 0 {
            return Err(ImpexError::BlockErrors(errors));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::memory::MemoryModel;
    use crate::model::{Instance as _, Model as _};
    use serde_json::json;
    use std::sync::Arc;

    fn setup(model_name: &str) -> (CommandRegistry, ModelRegistry, MemoryModel) {
        let commands = CommandRegistry::with_builtins();
        let models = ModelRegistry::new();
        let model = MemoryModel::new(model_name);
        models.register(Arc::new(model.clone()));
        (commands, models, model)
    }

    #[test]
    fn test_single_block_insert() {
        let (commands, models, model) = setup("product");
        let runner = ScriptRunner::new(&commands, &models);

        let script = "INSERT product\nsku,name\nA,Apple\nB,Banana\n";
        let summary = runner.run_script(script.as_bytes()).unwrap();

        assert_eq!(summary.blocks, 1);
        assert_eq!(summary.records, 2);
        assert_eq!(summary.errors, 0);
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn test_blog_post_scenario() {
        let (commands, models, model) = setup("post");
        let runner = ScriptRunner::new(&commands, &models);

        let script = "INSERT post\nidentifier,published\nposty,true\n";
        runner.run_script(script.as_bytes()).unwrap();

        let stored = model.record("1").unwrap();
        assert_eq!(stored["identifier"], json!("posty"));
        assert_eq!(stored["published"], json!(true));
    }

    #[test]
    fn test_two_blocks_separated_by_blank_row() {
        let (commands, models, model) = setup("product");
        let runner = ScriptRunner::new(&commands, &models);

        let script = "INSERT product\nsku\nA\n,\nINSERT product\nsku\nB\n";
        let summary = runner.run_script(script.as_bytes()).unwrap();

        assert_eq!(summary.blocks, 2);
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn test_continuation_line_appends() {
        let (commands, models, model) = setup("product");
        let runner = ScriptRunner::new(&commands, &models);

        let script = "INSERT product ...\nskip=internal\nsku,internal\nA,x\n";
        runner.run_script(script.as_bytes()).unwrap();

        let stored = model.record("1").unwrap();
        assert_eq!(stored["sku"], json!("A"));
        assert!(stored.get("internal").is_none());
    }

    #[test]
    fn test_pipe_line_attaches_after_main_command() {
        let (commands, models, model) = setup("product");
        let runner = ScriptRunner::new(&commands, &models);

        // MEDIA must come after INSERT in the chain: it fails without an
        // input object, so a wrong assembly order would surface as errors
        let script = "|MEDIA image --skipErrors\nINSERT product\nsku\nA\n";
        let summary = runner.run_script(script.as_bytes()).unwrap();

        assert_eq!(summary.errors, 0);
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn test_insert_store_chain_shares_exchange() {
        let (commands, models, model) = setup("product");
        let runner = ScriptRunner::new(&commands, &models);

        let script = "|STORE obj\nINSERT product\nname\nx\n";
        let summary = runner.run_script(script.as_bytes()).unwrap();

        assert_eq!(summary.errors, 0);
        assert_eq!(model.record("1").unwrap()["name"], json!("x"));
    }

    #[test]
    fn test_unknown_command_aborts() {
        let (commands, models, _model) = setup("product");
        let runner = ScriptRunner::new(&commands, &models);

        let err = runner.run_script("FROBNICATE x\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ImpexError::Script(ScriptError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_record_errors_reported_as_block_errors() {
        let (commands, models, _model) = setup("product");
        let runner = ScriptRunner::new(&commands, &models);

        // loading a missing id fails per record, then surfaces as a count
        let script = "UPDATE product\n_id,price\n404,1\n";
        let err = runner.run_script(script.as_bytes()).unwrap_err();
        assert!(matches!(err, ImpexError::BlockErrors(1)));
    }

    #[test]
    fn test_run_command_update_block() {
        let (commands, models, model) = setup("product");

        let mut seeded = model.spawn();
        seeded.set("sku", json!("A")).unwrap();
        seeded.set("price", json!(1)).unwrap();
        seeded.save().unwrap();

        let runner = ScriptRunner::new(&commands, &models);
        let data = "_id,price\n1,2\n";
        let summary = runner
            .run_command("UPDATE product", data.as_bytes())
            .unwrap();

        assert_eq!(summary.records, 1);
        assert_eq!(model.record("1").unwrap()["price"], json!(2));
    }
}
