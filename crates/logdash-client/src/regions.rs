//! Coalescing of missing fights into time ranges for the remote API.

use logdash_shared::{FightId, FightMeta, QueryKind};

/// A time range covering one or more fights, fetched with one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub start: i64,
    pub end: i64,
    pub fights: Vec<FightId>,
}

impl Region {
    fn single(fight: &FightMeta) -> Self {
        Self {
            start: fight.start_time,
            end: fight.end_time,
            fights: vec![fight.id],
        }
    }

    /// Whether `fight` directly follows the last fight of this region by id.
    fn continues_with(&self, fight: FightId) -> bool {
        self.fights
            .last()
            .and_then(|last| last.checked_add(1))
            .is_some_and(|next| next == fight)
    }
}

/// Group `fights` (ascending ids) into regions.
///
/// Event queries merge runs of consecutive fight ids into one region from the
/// first fight's start to the last fight's end. Table queries get one region
/// per fight. Fights missing from `report_fights` are skipped.
pub fn coalesce_regions(kind: QueryKind, fights: &[FightId], report_fights: &[FightMeta]) -> Vec<Region> {
    let metas = fights
        .iter()
        .filter_map(|id| report_fights.iter().find(|fight| fight.id == *id));

    if !kind.is_event() {
        return metas.map(Region::single).collect();
    }

    metas.fold(Vec::new(), |mut regions: Vec<Region>, fight| {
        match regions.last_mut() {
            Some(region) if region.continues_with(fight.id) => {
                region.end = fight.end_time;
                region.fights.push(fight.id);
            }
            _ => regions.push(Region::single(fight)),
        }
        regions
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fight;
    use logdash_shared::TableKind;

    fn report_fights() -> Vec<FightMeta> {
        (1..=10)
            .map(|id| fight(id, 1, i64::from(id) * 100, i64::from(id) * 100 + 50))
            .collect()
    }

    #[test]
    fn test_event_runs_are_merged() {
        let regions = coalesce_regions(QueryKind::Event, &[3, 4, 5, 9], &report_fights());
        assert_eq!(
            regions,
            vec![
                Region {
                    start: 300,
                    end: 550,
                    fights: vec![3, 4, 5]
                },
                Region {
                    start: 900,
                    end: 950,
                    fights: vec![9]
                },
            ]
        );
    }

    #[test]
    fn test_table_gets_one_region_per_fight() {
        let kind = QueryKind::Table {
            table: TableKind::Healing,
        };
        let regions = coalesce_regions(kind, &[3, 4, 5], &report_fights());
        assert_eq!(regions.len(), 3);
        assert!(regions.iter().all(|region| region.fights.len() == 1));
        assert_eq!(regions[1].start, 400);
    }

    #[test]
    fn test_unknown_fights_are_skipped() {
        let regions = coalesce_regions(QueryKind::Event, &[2, 42], &report_fights());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].fights, vec![2]);
    }

    #[test]
    fn test_empty_input() {
        assert!(coalesce_regions(QueryKind::Event, &[], &report_fights()).is_empty());
    }
}
