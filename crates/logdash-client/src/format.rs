//! Turning raw remote payloads into per-fight row sets.

use serde_json::{Map, Value};

use logdash_net::RawPayload;
use logdash_shared::constants::UNKNOWN_ACTOR;
use logdash_shared::{ActorMeta, FightId, FightMeta, QueryDefinition, ReportCode, RowSet};

use crate::error::{ClientError, Result};
use crate::state::ReportCacheEntry;

/// The report metadata needed to format rows, detached from the shared state
/// so it can be used across await points.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub code: ReportCode,
    pub fights: Vec<FightMeta>,
    pub friendlies: Vec<ActorMeta>,
    pub enemies: Vec<ActorMeta>,
}

impl ReportContext {
    pub fn from_entry(entry: &ReportCacheEntry) -> Self {
        Self {
            code: entry.code.clone(),
            fights: entry.fights.clone(),
            friendlies: entry.friendlies.clone(),
            enemies: entry.enemies.clone(),
        }
    }

    /// Friendlies are searched before enemies.
    pub fn lookup_actor(&self, id: i64) -> Option<&ActorMeta> {
        self.friendlies
            .iter()
            .chain(self.enemies.iter())
            .find(|actor| actor.id == id)
    }

    pub fn actor_name(&self, id: i64) -> &str {
        self.lookup_actor(id)
            .map(|actor| actor.name.as_str())
            .unwrap_or(UNKNOWN_ACTOR)
    }

    fn fight(&self, id: FightId) -> Option<&FightMeta> {
        self.fights.iter().find(|fight| fight.id == id)
    }
}

fn payload_kind(payload: &RawPayload) -> &'static str {
    match payload {
        RawPayload::Events(_) => "event",
        RawPayload::Table(_) => "table",
    }
}

/// Build a row from `base` fields overlaid by the datum's own fields.
fn merge_row(mut base: Map<String, Value>, datum: Value) -> Value {
    match datum {
        Value::Object(fields) => {
            base.extend(fields);
            Value::Object(base)
        }
        other => {
            base.insert("value".to_string(), other);
            Value::Object(base)
        }
    }
}

/// Actor id field of an event, treating `0` and non-numbers as absent.
fn actor_id(datum: &Value, field: &str) -> Option<i64> {
    datum.get(field).and_then(Value::as_i64).filter(|&id| id != 0)
}

fn event_row(ctx: &ReportContext, fight: FightId, datum: Value) -> Value {
    let mut base = Map::new();
    base.insert("report".to_string(), Value::from(ctx.code.as_str()));
    base.insert("fight".to_string(), Value::from(fight));
    if let Some(id) = actor_id(&datum, "sourceID") {
        base.insert("sourceName".to_string(), Value::from(ctx.actor_name(id)));
    }
    if let Some(id) = actor_id(&datum, "targetID") {
        base.insert("targetName".to_string(), Value::from(ctx.actor_name(id)));
    }
    merge_row(base, datum)
}

fn timestamp(datum: &Value) -> Option<i64> {
    datum.get("timestamp").and_then(Value::as_i64)
}

/// Split one region's payload into a row set per fight, in `fights` order.
///
/// Event payloads are partitioned by each fight's inclusive time window; an
/// event inside no window is dropped. A table payload is the single fight's
/// data.
pub fn split_payload(
    ctx: &ReportContext,
    fights: &[FightId],
    query: &QueryDefinition,
    payload: RawPayload,
) -> Result<Vec<(FightId, RowSet)>> {
    let expected = if query.kind.is_event() { "event" } else { "table" };
    let found = payload_kind(&payload);

    match payload {
        RawPayload::Events(data) if query.kind.is_event() => Ok(fights
            .iter()
            .map(|&id| {
                let values = match ctx.fight(id) {
                    Some(meta) => data
                        .events
                        .iter()
                        .filter(|datum| timestamp(datum).is_some_and(|ts| meta.contains(ts)))
                        .map(|datum| event_row(ctx, id, datum.clone()))
                        .collect(),
                    None => Vec::new(),
                };
                (id, RowSet::new(values))
            })
            .collect()),
        RawPayload::Table(data) if !query.kind.is_event() => {
            let Some(&fight) = fights.first() else {
                return Ok(Vec::new());
            };
            let values = data
                .entries
                .into_iter()
                .map(|datum| {
                    let mut base = Map::new();
                    base.insert("report".to_string(), Value::from(ctx.code.as_str()));
                    base.insert("fight".to_string(), Value::from(fight));
                    base.insert("totalTime".to_string(), Value::from(data.total_time));
                    merge_row(base, datum)
                })
                .collect();
            Ok(vec![(fight, RowSet::new(values))])
        }
        _ => Err(ClientError::UnexpectedPayload { expected, found }),
    }
}
