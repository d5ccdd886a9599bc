use clap::{Subcommand, ValueEnum};
use mealticket_core::{CodeSupplier, RandomCodeSupplier, StudentRecord, TicketFilter, TicketStatus};
use serde::Serialize;

use super::{open_service, print_json};

#[derive(Subcommand)]
pub enum StudentAction {
    /// Register a new student
    Register {
        /// Student name
        name: String,
        /// Login code (a random six-digit code if omitted)
        #[arg(long)]
        code: Option<String>,
    },
    /// Look up a student by login code
    Login {
        code: String,
    },
    /// List registered students
    List {
        #[arg(long, value_enum, default_value_t = FilterArg::All)]
        filter: FilterArg,
    },
    /// Remove a student
    Remove {
        id: String,
    },
    /// Show today's ticket status
    Status {
        id: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FilterArg {
    All,
    Used,
    Unused,
}

impl From<FilterArg> for TicketFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => TicketFilter::All,
            FilterArg::Used => TicketFilter::Used,
            FilterArg::Unused => TicketFilter::Unused,
        }
    }
}

#[derive(Serialize)]
struct StudentView {
    #[serde(flatten)]
    record: StudentRecord,
    ticket: TicketStatus,
}

pub fn run(action: StudentAction) -> Result<(), Box<dyn std::error::Error>> {
    let service = open_service(None)?;
    match action {
        StudentAction::Register { name, code } => {
            let code = code.unwrap_or_else(|| RandomCodeSupplier.next_code());
            let record = service.register(&name, &code)?;
            print_json(&record)?;
        }
        StudentAction::Login { code } => {
            let record = service
                .find_by_code(code.trim())
                .ok_or_else(|| format!("no student with code {code}"))?;
            let ticket = service.ticket_status(&record.id)?;
            print_json(&StudentView { record, ticket })?;
        }
        StudentAction::List { filter } => {
            print_json(&service.list(filter.into()))?;
        }
        StudentAction::Remove { id } => {
            let record = service
                .remove(&id)?
                .ok_or_else(|| format!("student not found: {id}"))?;
            print_json(&record)?;
        }
        StudentAction::Status { id } => {
            let record = service
                .find_by_id(&id)
                .ok_or_else(|| format!("student not found: {id}"))?;
            let ticket = service.ticket_status(&id)?;
            print_json(&StudentView { record, ticket })?;
        }
    }
    Ok(())
}
