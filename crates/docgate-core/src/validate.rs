//! Command validation.
//!
//! Checks that every field an operation needs is present and non-empty.
//! Only [`validate`] can produce a [`ValidatedCommand`], so code downstream
//! of it may rely on presence without re-checking.

use crate::command::{Command, CommandKind};
use crate::error::{GatewayError, GatewayResult};

/// A command whose required fields are all present.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCommand(Command);

impl ValidatedCommand {
    /// The validated command.
    pub const fn command(&self) -> &Command {
        &self.0
    }

    /// The command kind.
    pub const fn kind(&self) -> CommandKind {
        self.0.kind()
    }

    /// Unwraps into the inner command.
    pub fn into_inner(self) -> Command {
        self.0
    }
}

/// Validates `command`, reporting every missing field at once.
pub fn validate(command: Command) -> GatewayResult<ValidatedCommand> {
    let missing = missing_fields(&command);
    if missing.is_empty() {
        Ok(ValidatedCommand(command))
    } else {
        Err(GatewayError::validation(
            requirement(command.kind()),
            missing,
        ))
    }
}

/// The names of required fields that are absent or empty, in order.
pub fn missing_fields(command: &Command) -> Vec<&'static str> {
    let ns = command.namespace();
    let mut missing = Vec::new();
    if ns.database.is_empty() {
        missing.push("database");
    }
    if ns.collection.is_empty() {
        missing.push("collection");
    }

    match command {
        Command::GetAll { .. } | Command::DeleteMany { .. } => {}
        Command::GetOne { filter, .. } => {
            if filter.is_none() {
                missing.push("filter");
            }
        }
        Command::InsertOne { data, .. } | Command::UpdateMany { data, .. } => {
            if data.is_none() {
                missing.push("data");
            }
        }
        Command::InsertMany { data, .. } => {
            if data.is_none() {
                missing.push("data");
            }
        }
        Command::UpdateOne {
            object_id, data, ..
        } => {
            if object_id.is_empty() {
                missing.push("objectId");
            }
            if data.is_none() {
                missing.push("data");
            }
        }
        Command::DeleteOne { object_id, .. } => {
            if object_id.is_empty() {
                missing.push("objectId");
            }
        }
    }
    missing
}

/// The requirement message reported when validation fails for `kind`.
pub const fn requirement(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::GetAll | CommandKind::DeleteMany => "Database and collection are required",
        CommandKind::GetOne => "Database, collection and filter are required",
        CommandKind::InsertOne | CommandKind::InsertMany | CommandKind::UpdateMany => {
            "Database, collection and data are required"
        }
        CommandKind::UpdateOne => "Database, collection, objectId and data are required",
        CommandKind::DeleteOne => "Database, collection and objectId are required",
    }
}
