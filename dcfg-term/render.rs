//! Plain text views of documents, problems and sessions.
//!
//! Line numbers are shown 1-based.

use std::fmt::Write;

use dcfg_lib::{
  Line,
  LineStatus,
  StatusCounts,
  problems::{
    ConflictGroup,
    Problem,
    Severity,
  },
  protocol::{
    NetMatches,
    Summary,
  },
  session::{
    AfFields,
    MutexEntry,
    MutexSession,
  },
};

pub fn line_row(line: &Line) -> String {
  format!(
    "{:>5}  {:<8}  {}",
    line.position + 1,
    line.status().as_str(),
    line.raw_text
  )
}

pub fn lines(lines: &[Line], filter: Option<LineStatus>) -> String {
  let mut out = String::new();
  for line in lines
    .iter()
    .filter(|line| filter.is_none_or(|status| line.status() == status))
  {
    let _ = writeln!(out, "{}", line_row(line));
  }
  out
}

pub fn counts(counts: &StatusCounts) -> String {
  let mut out = format!("{} lines", counts.total);
  for status in LineStatus::ALL {
    let count = counts.get(status);
    if count > 0 {
      let _ = write!(out, ", {count} {}", status.as_str());
    }
  }
  out
}

pub fn summary(summary: &Summary) -> String {
  let mut flags = Vec::new();
  if summary.can_undo {
    flags.push("undo");
  }
  if summary.can_redo {
    flags.push("redo");
  }
  let mut out = format!(
    "{}  {}  {}  {} lines",
    summary.doc_id, summary.doc_type, summary.file_path, summary.total_lines
  );
  if !flags.is_empty() {
    let _ = write!(out, "  [{}]", flags.join(", "));
  }
  out
}

fn severity(severity: Severity) -> &'static str {
  match severity {
    Severity::Error => "error",
    Severity::Conflict => "conflict",
    Severity::Warning => "warning",
  }
}

pub fn problems(problems: &[Problem]) -> String {
  let mut out = String::new();
  for problem in problems {
    let _ = writeln!(
      out,
      "{:>5}  {:<8}  {}",
      problem.position + 1,
      severity(problem.severity),
      problem.message
    );
  }
  out
}

pub fn conflict_groups(groups: &[ConflictGroup]) -> String {
  let mut out = String::new();
  for group in groups {
    let _ = writeln!(out, "line {}", group.root + 1);
    for peer in &group.peers {
      let _ = writeln!(
        out,
        "  line {}: {}",
        peer.position + 1,
        peer.shared_nets.join(", ")
      );
    }
  }
  out
}

pub fn af_fields(fields: &AfFields) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "template  {}", fields.template.as_deref().unwrap_or("-"));
  let _ = writeln!(out, "net       {}", fields.net);
  let _ = writeln!(out, "af        {}", fields.af_value);
  let flags = [
    ("template-regex", fields.is_template_regex),
    ("net-regex", fields.is_net_regex),
    ("em", fields.is_em_enabled),
    ("sh", fields.is_sh_enabled),
    ("sch", fields.is_sch_enabled),
  ];
  let enabled: Vec<&str> = flags
    .iter()
    .filter(|(_, on)| *on)
    .map(|(name, _)| *name)
    .collect();
  if !enabled.is_empty() {
    let _ = writeln!(out, "flags     {}", enabled.join(" "));
  }
  out
}

fn entry(entry: &MutexEntry) -> String {
  let mut out = entry.net_name().to_string();
  if let Some(template) = entry.template_name() {
    out = format!("{template}/{out}");
  }
  if entry.regex_mode() {
    let _ = write!(out, " (regex, {} matches)", entry.match_count());
  }
  out
}

pub fn mutex_session(session: &MutexSession) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "template    {}", session.template().unwrap_or("-"));
  let _ = writeln!(out, "num-active  {}", session.num_active());
  let fev = session.fev().as_str();
  let _ = writeln!(out, "fev         {}", if fev.is_empty() { "-" } else { fev });
  let _ = writeln!(out, "mutexed");
  for mutexed in session.mutexed_entries() {
    let marker = if session.is_active(mutexed.net_name()) {
      '*'
    } else {
      ' '
    };
    let _ = writeln!(out, "  {marker} {}", entry(mutexed));
  }
  out
}

pub fn messages(label: &str, messages: &[String]) -> String {
  let mut out = String::new();
  for message in messages {
    let _ = writeln!(out, "{label}: {message}");
  }
  out
}

pub fn nets(matches: &NetMatches) -> String {
  let mut out = String::new();
  for template in &matches.templates {
    let _ = writeln!(out, "template  {template}");
  }
  for net in &matches.nets {
    let _ = writeln!(out, "net       {net}");
  }
  out
}
