//! Reply texts. Message wording lives here and nowhere else.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use milkbot_core::BatchId;
use milkbot_infra::{Consumed, Emptied, Leaderboard, Purchased};
use milkbot_inventory::{AvailableBatch, LeaderboardEntry};

use crate::command::{ParseError, BUY_USAGE, EMPTY_USAGE};
use crate::reply::{Reply, ReplyOption};

pub const DATE_FORMAT: &str = "%d.%m.%Y";

pub fn date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn quantity(value: Decimal) -> String {
    value.normalize().to_string()
}

/// `3: 1.5L - expires 10.01.2025`. The leading id is what `empty` parses back.
pub fn batch_label(batch: &AvailableBatch) -> String {
    format!(
        "{}: {}L - expires {}",
        batch.batch_id,
        quantity(batch.remaining_amount),
        date(batch.expiration_date)
    )
}

pub fn greeting() -> Reply {
    Reply::text("Welcome to the milk union!")
}

pub fn help() -> Reply {
    Reply::text(format!(
        "Commands:\n\
         {BUY_USAGE} (record a purchased carton)\n\
         /drink (drink one cup, nothing else)\n\
         {EMPTY_USAGE} (empty a carton; without an id you get to choose)\n\
         /empty-oldest (empty the carton that expires first)\n\
         /status (is there milk in the lounge?)\n\
         /leaderboard (top milk fans and milk supporters)"
    ))
}

pub fn purchased(p: &Purchased) -> Reply {
    Reply::text(format!(
        "Milk bought!\nBuyer: {}\nSize: {} litres\nExpires: {}",
        p.buyer_name,
        p.amount,
        date(p.expiration_date)
    ))
}

pub fn consumed(c: &Consumed) -> Reply {
    Reply::text(format!(
        "You drank milk! Good for you!\n{} L left in batch {} (expires {})",
        quantity(c.remaining_amount),
        c.batch_id,
        date(c.expiration_date)
    ))
}

pub fn nothing_to_drink() -> Reply {
    Reply::text("There shouldn't be any milk left to drink?!")
}

pub fn nothing_to_empty() -> Reply {
    Reply::text("There shouldn't be any milk left to empty!")
}

pub fn choose_batch(available: &[AvailableBatch]) -> Reply {
    if available.is_empty() {
        return nothing_to_empty();
    }
    let options = available
        .iter()
        .map(|b| ReplyOption {
            batch_id: b.batch_id,
            label: batch_label(b),
        })
        .collect();
    Reply::with_options("Choose the milk to empty:", options)
}

pub fn emptied(e: &Emptied) -> Reply {
    if e.discarded.is_zero() {
        return Reply::text(format!("Milk {} was already empty.", e.batch_id));
    }
    Reply::text(format!(
        "Milk emptied! ({} L thrown away from batch {})",
        quantity(e.discarded),
        e.batch_id
    ))
}

pub fn batch_not_found(id: BatchId) -> Reply {
    Reply::text(format!("There is no milk batch {id}."))
}

pub fn status(available: &[AvailableBatch]) -> Reply {
    if available.is_empty() {
        return Reply::text("No milk in the lounge!");
    }
    let lines: Vec<String> = available.iter().map(batch_label).collect();
    Reply::text(format!("Milk status:\n{}", lines.join("\n")))
}

pub fn leaderboard(board: &Leaderboard) -> Reply {
    let drinkers = board_section("Top milk drinkers:", &board.drinkers, "cups");
    let buyers = board_section("Top milk buyers:", &board.buyers, "litres");
    Reply::text(format!("{drinkers}\n{buyers}"))
}

fn board_section(header: &str, entries: &[LeaderboardEntry], unit: &str) -> String {
    if entries.is_empty() {
        return format!("{header}\nNo data yet.\n");
    }
    let mut section = format!("{header}\n");
    for (rank, entry) in entries.iter().enumerate() {
        section.push_str(&format!(
            "{}. {}: {} {unit}\n",
            rank + 1,
            entry.name,
            quantity(entry.total)
        ));
    }
    section
}

pub fn parse_error(err: &ParseError) -> Reply {
    match err {
        ParseError::UnknownCommand(name) => {
            Reply::text(format!("Unknown command '{name}'. Try /help."))
        }
        ParseError::MissingArgument { usage } => {
            Reply::text(format!("Missing input. Usage: {usage}"))
        }
        ParseError::InvalidArgument { reason, usage } => {
            Reply::text(format!("Invalid input: {reason}. Usage: {usage}"))
        }
    }
}

pub fn invalid_input(reason: &str) -> Reply {
    Reply::text(format!("Invalid input: {reason}."))
}

pub fn apology() -> Reply {
    Reply::text("Something went wrong with the milk records, please try again later.")
}
