//! FILENAME: tabula-format/src/codec.rs
//! PURPOSE: Encoders and decoders between live objects and records.
//! CONTEXT: A chain record is its line from root to head; each step record
//! carries the kind name, the kind's configuration payload, and any
//! benched alternatives as nested step records. Decoding replays the
//! public editing API (push_head, add_alternative) instead of restoring
//! links and ids verbatim, so a record can not smuggle in a corrupt arena
//! and saved ids never constrain the arena of a loaded chain. Workspace
//! records do keep chain ids, because join configurations point at them.

use engine::Expression;
use step_engine::{Chain, ChainId, StepId, StepKind, Workspace};

use crate::error::FormatError;
use crate::record::{Field, Record};

/// The newest record layout this build reads and the one it always writes.
pub const FORMAT_VERSION: u32 = 1;

/// Step kind names a version-1 record may carry.
const KNOWN_KINDS: &[&str] = &[
    "literal",
    "sequence",
    "filter",
    "calculate",
    "sort",
    "limit",
    "transpose",
    "aggregate",
    "pivot",
    "flatten",
    "join",
    "sample",
];

fn check_version(record: &Record) -> Result<(), FormatError> {
    let version = record.version()?;
    if version > FORMAT_VERSION {
        return Err(FormatError::Version(version));
    }
    Ok(())
}

// ============================================================================
// Step kinds
// ============================================================================

/// Encodes one step kind: its name under "kind", its configuration under
/// "config" (absent for kinds that have none).
pub fn encode_step_kind(kind: &StepKind) -> Result<Record, FormatError> {
    let mut record = Record::versioned(FORMAT_VERSION).with("kind", kind.label());
    if let serde_json::Value::Object(payload) = serde_json::to_value(kind)? {
        if let Some((_, config)) = payload.into_iter().next() {
            record.set("config", Field::from(config));
        }
    }
    Ok(record)
}

pub fn decode_step_kind(record: &Record) -> Result<StepKind, FormatError> {
    check_version(record)?;
    let kind = record.text("kind")?;
    if !KNOWN_KINDS.contains(&kind) {
        return Err(FormatError::UnknownKind(kind.to_string()));
    }
    // Rebuild the tagged shape serde derives expect for the kind enum.
    let value = match record.field("config") {
        Some(config) => {
            let mut tagged = serde_json::Map::new();
            tagged.insert(kind.to_string(), serde_json::Value::from(config.clone()));
            serde_json::Value::Object(tagged)
        }
        None => serde_json::Value::String(kind.to_string()),
    };
    Ok(serde_json::from_value(value)?)
}

// ============================================================================
// Chains
// ============================================================================

fn encode_step(chain: &Chain, id: StepId) -> Result<Record, FormatError> {
    let step = chain
        .step(id)
        .ok_or_else(|| FormatError::malformed(format!("the chain does not hold step {id}")))?;
    let mut record = encode_step_kind(&step.kind)?;

    let mut bench = Vec::new();
    for &alternative in step.alternatives() {
        let benched = chain.step(alternative).ok_or_else(|| {
            FormatError::malformed(format!("the chain does not hold benched step {alternative}"))
        })?;
        bench.push(Field::Record(encode_step_kind(&benched.kind)?));
    }
    if !bench.is_empty() {
        record.set("alternatives", Field::List(bench));
    }
    Ok(record)
}

pub fn encode_chain(chain: &Chain) -> Result<Record, FormatError> {
    let mut line = chain.sequence();
    line.reverse();

    let mut steps = Vec::with_capacity(line.len());
    for id in line {
        steps.push(Field::Record(encode_step(chain, id)?));
    }
    Ok(Record::versioned(FORMAT_VERSION).with("steps", Field::List(steps)))
}

pub fn decode_chain(record: &Record) -> Result<Chain, FormatError> {
    check_version(record)?;
    let mut chain = Chain::new();
    for entry in record.list("steps")? {
        let step = entry
            .as_record()
            .ok_or_else(|| FormatError::wrong_type("steps", "record", entry.kind()))?;
        let id = chain.push_head(decode_step_kind(step)?);

        if let Some(bench) = step.field("alternatives") {
            let items = bench
                .as_list()
                .ok_or_else(|| FormatError::wrong_type("alternatives", "list", bench.kind()))?;
            for item in items {
                let benched = item
                    .as_record()
                    .ok_or_else(|| FormatError::wrong_type("alternatives", "record", item.kind()))?;
                let kind = decode_step_kind(benched)?;
                chain
                    .add_alternative(id, kind)
                    .map_err(|error| FormatError::malformed(error.to_string()))?;
            }
        }
    }
    Ok(chain)
}

// ============================================================================
// Workspaces
// ============================================================================

pub fn encode_workspace(workspace: &Workspace) -> Result<Record, FormatError> {
    let mut chains = Vec::with_capacity(workspace.len());
    for id in workspace.chain_ids() {
        if let Some(chain) = workspace.chain(id) {
            chains.push(Field::Record(
                Record::new()
                    .with("id", id)
                    .with("chain", encode_chain(chain)?),
            ));
        }
    }
    Ok(Record::versioned(FORMAT_VERSION).with("chains", Field::List(chains)))
}

pub fn decode_workspace(record: &Record) -> Result<Workspace, FormatError> {
    check_version(record)?;
    let mut workspace = Workspace::new();
    for entry in record.list("chains")? {
        let wrapper = entry
            .as_record()
            .ok_or_else(|| FormatError::wrong_type("chains", "record", entry.kind()))?;
        let id = wrapper.integer("id")?;
        let id = ChainId::try_from(id)
            .map_err(|_| FormatError::malformed(format!("chain id {id} is not a count")))?;
        let chain = decode_chain(wrapper.record("chain")?)?;
        workspace.restore_chain(id, chain);
    }
    Ok(workspace)
}

// ============================================================================
// Expressions
// ============================================================================

pub fn encode_expression(expr: &Expression) -> Result<Field, FormatError> {
    Ok(Field::from(serde_json::to_value(expr)?))
}

pub fn decode_expression(field: &Field) -> Result<Expression, FormatError> {
    Ok(serde_json::from_value(serde_json::Value::from(
        field.clone(),
    ))?)
}
