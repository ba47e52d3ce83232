//! Combined local and server pending listing.

use std::fmt;

use rgpl_queue::QueueSnapshot;
use serde::Serialize;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::warn;

use crate::api::ServerPending;

pub const NO_LOCAL_PENDING: &str = "Aucune donnée locale en attente";
pub const NO_SERVER_PENDING: &str = "Aucune donnée serveur en attente";

/// One line of the pending table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    /// `L<n>` for local rows, `S<n>` for server rows.
    pub label: String,
    pub nom: String,
    pub quartier: String,
    pub date: String,
}

/// One half of the status view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum Section {
    Rows(Vec<StatusRow>),
    /// The view could not be loaded; it is left out of the listing.
    Unavailable(String),
}

impl Section {
    pub fn rows(&self) -> &[StatusRow] {
        match self {
            Section::Rows(rows) => rows,
            Section::Unavailable(_) => &[],
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Section::Rows(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedStatus {
    pub connection: String,
    pub local: Section,
    pub server: Section,
}

impl RenderedStatus {
    /// Every row, local first.
    pub fn rows(&self) -> impl Iterator<Item = &StatusRow> {
        self.local.rows().iter().chain(self.server.rows())
    }
}

impl fmt::Display for RenderedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Connexion : {}", self.connection)?;
        writeln!(f, "ID\tNom\tQuartier\tDate")?;
        write_section(f, &self.local, NO_LOCAL_PENDING)?;
        write_section(f, &self.server, NO_SERVER_PENDING)
    }
}

fn write_section(f: &mut fmt::Formatter<'_>, section: &Section, empty: &str) -> fmt::Result {
    match section {
        Section::Rows(rows) if rows.is_empty() => writeln!(f, "{empty}"),
        Section::Rows(rows) => {
            for row in rows {
                writeln!(f, "{}\t{}\t{}\t{}", row.label, row.nom, row.quartier, row.date)?;
            }
            Ok(())
        }
        Section::Unavailable(_) => Ok(()),
    }
}

/// Rows for the local queue. Queued records carry no timestamp, so every row
/// shows the time of rendering. Undecodable rows are skipped.
pub fn local_rows(snapshot: &QueueSnapshot) -> Vec<StatusRow> {
    let now = render_time(OffsetDateTime::now_utc());
    snapshot
        .iter()
        .filter_map(|row| match row {
            Ok((_, record)) => Some(record),
            Err(e) => {
                warn!(error = %e, "skipping undecodable queued record in status");
                None
            }
        })
        .enumerate()
        .map(|(i, record)| StatusRow {
            label: format!("L{}", i + 1),
            nom: or_dash(record.text("nom")),
            quartier: or_dash(record.text("quartier")),
            date: now.clone(),
        })
        .collect()
}

pub fn server_rows(pending: &[ServerPending]) -> Vec<StatusRow> {
    pending
        .iter()
        .enumerate()
        .map(|(i, item)| StatusRow {
            label: format!("S{}", i + 1),
            nom: item.nom.clone(),
            quartier: item.quartier.clone(),
            date: item.date.clone(),
        })
        .collect()
}

fn or_dash(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "-".to_string(),
    }
}

fn render_time(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_default()
}
