//! Inbound chat commands and their parsing into logical operations.

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use milkbot_core::{Amount, BatchId, DomainError};

pub const BUY_USAGE: &str = "/buy <litres> <dd.mm.yyyy>";
pub const EMPTY_USAGE: &str = "/empty [batch id]";

/// Platform-neutral command as delivered by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub requester_display_name: String,
}

impl InboundCommand {
    pub fn new(command: impl Into<String>, args: &[&str], requester: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            requester_display_name: requester.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Greet,
    ShowHelp,
    PurchaseBatch {
        amount: Amount,
        expiration_date: NaiveDate,
    },
    ConsumeOne,
    ChooseBatchToEmpty,
    EmptySelected(BatchId),
    EmptyOldest,
    ShowStatus,
    ShowLeaderboard,
}

impl Operation {
    /// Stable name used on log spans.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Greet => "greet",
            Self::ShowHelp => "show_help",
            Self::PurchaseBatch { .. } => "purchase_batch",
            Self::ConsumeOne => "consume_one",
            Self::ChooseBatchToEmpty => "choose_batch_to_empty",
            Self::EmptySelected(_) => "empty_selected",
            Self::EmptyOldest => "empty_oldest",
            Self::ShowStatus => "show_status",
            Self::ShowLeaderboard => "show_leaderboard",
        }
    }
}

/// Why a command could not be turned into an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing argument, usage: {usage}")]
    MissingArgument { usage: &'static str },

    #[error("{reason}, usage: {usage}")]
    InvalidArgument {
        reason: String,
        usage: &'static str,
    },
}

/// `/Buy@milk_bot` → `buy`.
pub fn normalize_name(raw: &str) -> String {
    let name = raw.trim();
    let name = name.strip_prefix('/').unwrap_or(name);
    let name = name.split('@').next().unwrap_or_default();
    name.to_lowercase()
}

pub fn parse(command: &InboundCommand) -> Result<Operation, ParseError> {
    let name = normalize_name(&command.command);
    let args: Vec<&str> = command
        .args
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();

    match name.as_str() {
        "start" => Ok(Operation::Greet),
        "help" => Ok(Operation::ShowHelp),
        "buy" | "osta" => parse_purchase(&args),
        "drink" | "juo" => Ok(Operation::ConsumeOne),
        "empty" | "kellota" => match args.first() {
            None => Ok(Operation::ChooseBatchToEmpty),
            Some(selected) => parse_selection(selected).map(Operation::EmptySelected),
        },
        "empty-oldest" | "kellota-vanhin" => Ok(Operation::EmptyOldest),
        "status" | "tilanne" => Ok(Operation::ShowStatus),
        "leaderboard" => Ok(Operation::ShowLeaderboard),
        _ => Err(ParseError::UnknownCommand(name)),
    }
}

fn parse_purchase(args: &[&str]) -> Result<Operation, ParseError> {
    let (Some(amount), Some(date)) = (args.first(), args.get(1)) else {
        return Err(ParseError::MissingArgument { usage: BUY_USAGE });
    };

    let amount = amount
        .parse::<Amount>()
        .map_err(|e| invalid(domain_reason(e), BUY_USAGE))?;
    let expiration_date = parse_date(date)
        .ok_or_else(|| invalid(format!("invalid date '{date}'"), BUY_USAGE))?;

    Ok(Operation::PurchaseBatch {
        amount,
        expiration_date,
    })
}

/// Accepts a bare id or a whole option label such as `3: 1L - expires ...`.
fn parse_selection(raw: &str) -> Result<BatchId, ParseError> {
    let id = raw.split(':').next().unwrap_or_default();
    id.parse::<BatchId>()
        .map_err(|_| invalid(format!("invalid batch id '{raw}'"), EMPTY_USAGE))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

fn domain_reason(err: DomainError) -> String {
    match err {
        DomainError::Validation(msg)
        | DomainError::InvariantViolation(msg)
        | DomainError::InvalidId(msg) => msg,
    }
}

fn invalid(reason: String, usage: &'static str) -> ParseError {
    ParseError::InvalidArgument { reason, usage }
}
