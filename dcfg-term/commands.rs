//! Subcommands of the `dcfg` shell and how they drive a [`Workspace`].

use std::path::Path;

use clap::Subcommand;
use dcfg_lib::{
  DocType,
  DocumentId,
  LineStatus,
  Position,
  protocol::{
    NetQuery,
    SearchQuery,
  },
  session::{
    AfFields,
    FevMode,
  },
};
use dcfg_runtime::{
  CommitResult,
  Workspace,
};
use eyre::{
  Result,
  WrapErr,
  eyre,
};
use serde_json::Value;

use crate::render;

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Load a file into the service under the document id
  Load {
    file:     String,
    /// Document type; guessed from the file extension when omitted
    #[arg(long = "type")]
    doc_type: Option<DocType>,
  },
  /// List documents held by the service
  List,
  /// Print the lines of the document
  Lines {
    #[arg(long, value_parser = parse_status)]
    status: Option<LineStatus>,
  },
  /// Print errors, conflicts and warnings, most severe first
  Problems,
  /// Print conflicting lines grouped by their first line
  Conflicts,
  Search {
    query:  String,
    #[arg(long)]
    regex:  bool,
    #[arg(long, value_parser = parse_status)]
    status: Option<LineStatus>,
  },
  Delete {
    #[arg(value_parser = parse_line_number)]
    line: Position,
  },
  /// Insert a blank line before LINE
  Insert {
    #[arg(value_parser = parse_line_number)]
    line: Position,
  },
  Toggle {
    #[arg(value_parser = parse_line_number)]
    line: Position,
  },
  Swap {
    #[arg(value_parser = parse_line_number)]
    a: Position,
    #[arg(value_parser = parse_line_number)]
    b: Position,
  },
  /// Replace the text of a comment line
  Comment {
    #[arg(value_parser = parse_line_number)]
    line: Position,
    text: String,
  },
  Undo,
  Redo,
  /// Save the document, optionally to a new path
  Save { path: Option<String> },
  Close,
  /// Query nets and templates known to the service
  Nets {
    pattern:  String,
    #[arg(long)]
    template: Option<String>,
    #[arg(long)]
    regex:    bool,
  },
  /// Edit the fields of an AF line and commit them
  Edit {
    #[arg(value_parser = parse_line_number)]
    line: Position,
    /// Field assignment such as `af_value=0.5` or `is_em_enabled=true`
    #[arg(long = "set", value_parser = parse_assignment)]
    sets: Vec<(String, String)>,
  },
  /// Inspect or edit the mutex session of a line
  Mutex {
    #[arg(value_parser = parse_line_number)]
    line:       Position,
    /// Net pattern to add to the mutexed set
    #[arg(long)]
    add:        Vec<String>,
    #[arg(long)]
    regex:      bool,
    /// Net to make active
    #[arg(long)]
    activate:   Vec<String>,
    #[arg(long)]
    fev:        Option<FevMode>,
    #[arg(long)]
    num_active: Option<u32>,
    /// Commit the session after applying the changes
    #[arg(long)]
    commit:     bool,
  },
}

fn parse_line_number(value: &str) -> std::result::Result<Position, String> {
  match value.parse::<usize>() {
    Ok(0) => Err("line numbers start at 1".to_string()),
    Ok(number) => Ok(number - 1),
    Err(err) => Err(err.to_string()),
  }
}

fn parse_status(value: &str) -> std::result::Result<LineStatus, String> {
  LineStatus::parse(value).ok_or_else(|| {
    let known: Vec<&str> = LineStatus::ALL.iter().map(|status| status.as_str()).collect();
    format!("expected one of: {}", known.join(", "))
  })
}

fn parse_assignment(value: &str) -> std::result::Result<(String, String), String> {
  value
    .split_once('=')
    .map(|(key, value)| (key.trim().to_string(), value.to_string()))
    .ok_or_else(|| format!("expected KEY=VALUE, got {value:?}"))
}

fn guess_doc_type(file: &str) -> DocType {
  match Path::new(file).extension().and_then(|ext| ext.to_str()) {
    Some(ext) if ext.eq_ignore_ascii_case("mutex") => DocType::Mutex,
    _ => DocType::Af,
  }
}

/// Apply `key=value` assignments to AF fields. Values are read as JSON and
/// fall back to plain strings.
pub fn apply_assignments(fields: &AfFields, sets: &[(String, String)]) -> Result<AfFields> {
  let mut value = serde_json::to_value(fields)?;
  let Some(object) = value.as_object_mut() else {
    return Err(eyre!("af fields are not an object"));
  };
  for (key, raw) in sets {
    let slot = object
      .get_mut(key)
      .ok_or_else(|| eyre!("unknown af field {key:?}"))?;
    *slot = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
  }
  serde_json::from_value(value).wrap_err("invalid af field value")
}

impl Command {
  /// Commands that work on the mirrored copy of an already loaded document.
  fn needs_document(&self) -> bool {
    !matches!(self, Self::Load { .. } | Self::List | Self::Nets { .. })
  }
}

pub async fn run(workspace: &Workspace, doc_id: DocumentId, command: Command) -> Result<()> {
  if command.needs_document() {
    workspace
      .documents
      .attach_document(&doc_id)
      .await
      .wrap_err_with(|| format!("document {doc_id} is not loaded"))?;
  }
  let documents = &workspace.documents;

  match command {
    Command::Load { file, doc_type } => {
      let doc_type = doc_type.unwrap_or_else(|| guess_doc_type(&file));
      let summary = documents
        .load_document(doc_id.clone(), &file, doc_type)
        .await?;
      println!("{}", render::summary(&summary));
      if let Some(doc) = documents.document(&doc_id) {
        println!("{}", render::counts(&doc.counts()));
      }
    },
    Command::List => {
      for summary in documents.list_remote().await? {
        println!("{}", render::summary(&summary));
      }
    },
    Command::Lines { status } => {
      if let Some(doc) = documents.document(&doc_id) {
        print!("{}", render::lines(doc.lines(), status));
        println!("{}", render::counts(&doc.counts()));
      }
    },
    Command::Problems => print!("{}", render::problems(&workspace.problems(&doc_id))),
    Command::Conflicts => {
      print!(
        "{}",
        render::conflict_groups(&workspace.conflict_groups(&doc_id))
      );
    },
    Command::Search {
      query,
      regex,
      status,
    } => {
      let query = SearchQuery {
        query,
        use_regex: regex,
        status_filter: status,
      };
      workspace.search.search(doc_id, query).await?;
      if let Some(results) = workspace.search.results() {
        print!("{}", render::lines(&results.lines, None));
      }
    },
    Command::Delete { line } => documents.delete_line(&doc_id, line).await?,
    Command::Insert { line } => documents.insert_line(&doc_id, line).await?,
    Command::Toggle { line } => documents.toggle_comment(&doc_id, line).await?,
    Command::Swap { a, b } => documents.swap_lines(&doc_id, a, b).await?,
    Command::Comment { line, text } => {
      documents.edit_comment_text(&doc_id, line, &text).await?;
    },
    Command::Undo => {
      let history = documents.undo(&doc_id).await?;
      println!("undo: {}, redo: {}", history.can_undo, history.can_redo);
    },
    Command::Redo => {
      let history = documents.redo(&doc_id).await?;
      println!("undo: {}, redo: {}", history.can_undo, history.can_redo);
    },
    Command::Save { path } => {
      let saved = documents.save_document(&doc_id, path.as_deref()).await?;
      println!("saved {saved}");
    },
    Command::Close => documents.close_document(&doc_id).await,
    Command::Nets {
      pattern,
      template,
      regex,
    } => {
      let query = NetQuery {
        template_regex: regex && template.is_some(),
        template,
        net_pattern: pattern,
        net_regex: regex,
      };
      workspace.search.query_nets(&query).await?;
      if let Some(matches) = workspace.search.nets() {
        print!("{}", render::nets(&matches));
      }
    },
    Command::Edit { line, sets } => edit_af(workspace, doc_id, line, &sets).await?,
    Command::Mutex {
      line,
      add,
      regex,
      activate,
      fev,
      num_active,
      commit,
    } => {
      let session = &workspace.session;
      session.open_edit(doc_id, line, DocType::Mutex).await?;
      let result = async {
        for pattern in add {
          session.add_mutexed(None, pattern, regex).await?;
        }
        for net in activate {
          session.add_active(None, net).await?;
        }
        if let Some(fev) = fev {
          session.set_fev(fev).await?;
        }
        if let Some(num_active) = num_active {
          session.set_num_active(num_active).await?;
        }
        if let Some(mutex) = session.state().session().and_then(|open| open.mutex().cloned()) {
          print!("{}", render::mutex_session(&mutex));
        }
        if commit {
          report_commit(session.commit().await?);
        }
        Ok::<_, eyre::Report>(())
      }
      .await;
      session.cancel_edit();
      result?;
    },
  }
  Ok(())
}

async fn edit_af(
  workspace: &Workspace,
  doc_id: DocumentId,
  line: Position,
  sets: &[(String, String)],
) -> Result<()> {
  let session = &workspace.session;
  session.open_edit(doc_id, line, DocType::Af).await?;
  let result = async {
    let working = session
      .state()
      .session()
      .and_then(|open| open.af_working().cloned())
      .ok_or_else(|| eyre!("line {} has no editable af fields", line + 1))?;
    let draft = apply_assignments(&working, sets)?;
    print!("{}", render::af_fields(&draft));
    session.edit_af(draft)?;
    report_commit(session.commit().await?);
    Ok::<_, eyre::Report>(())
  }
  .await;
  session.cancel_edit();
  result
}

fn report_commit(result: CommitResult) {
  match result {
    CommitResult::Committed { warnings } => {
      print!("{}", render::messages("warning", &warnings));
      println!("committed");
    },
    CommitResult::Rejected { errors, warnings } => {
      print!("{}", render::messages("error", &errors));
      print!("{}", render::messages("warning", &warnings));
      println!("rejected");
    },
    CommitResult::Discarded => println!("discarded"),
  }
}
