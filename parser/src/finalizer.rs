//! Applies the outcome of an analyzed match to a company.

use serde::Serialize;
use tracing::{debug, info};

use crate::analyzer::lifecycle::{MatchAnalysis, UnitStatus};
use crate::company::Company;
use crate::error::{Error, ErrorKind};
use crate::types::PlayerId;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizeOutcome {
    /// Captured equipment added to the inventory
    pub equipment_added: usize,
    /// Slot items attached to squads
    pub slot_items_added: usize,
    /// Squads whose veterancy changed
    pub veterancy_updates: usize,
}

fn belongs_to(owner: Option<PlayerId>, company_owner: PlayerId) -> bool {
    owner.is_none_or(|owner| owner == company_owner)
}

fn has_veterancy(unit: &UnitStatus) -> bool {
    unit.vet_change > 0 || unit.vet_experience != 0.0
}

/// Units fielded by `company_owner` that carry something to write back.
fn changed_units(
    analysis: &MatchAnalysis,
    company_owner: PlayerId,
) -> impl Iterator<Item = &UnitStatus> {
    analysis.units.values().filter(move |unit| {
        belongs_to(unit.owner, company_owner)
            && (!unit.captured_slot_items.is_empty() || has_veterancy(unit))
    })
}

/// Applies captured equipment, picked up items and veterancy to `company`.
///
/// Every squad the analysis refers to is checked before anything is written, so on error
/// the company is left exactly as it was. Applying the same analysis twice adds the same
/// equipment twice.
pub fn finalize(analysis: &MatchAnalysis, company: &mut Company) -> Result<FinalizeOutcome, Error> {
    if let Some(missing) = changed_units(analysis, company.owner)
        .find(|unit| company.squad_by_id(unit.squad_id).is_none())
    {
        return Err(Error::new(ErrorKind::UnknownSquad(missing.squad_id)));
    }

    let mut outcome = FinalizeOutcome::default();

    for captured in &analysis.captured_equipment {
        if captured.side == Some(company.owner) {
            company.inventory.push(captured.blueprint.clone());
            outcome.equipment_added += 1;
        }
    }

    for unit in changed_units(analysis, company.owner) {
        let Some(squad) = company.squad_by_id_mut(unit.squad_id) else {
            continue;
        };
        squad
            .slot_items
            .extend(unit.captured_slot_items.iter().cloned());
        outcome.slot_items_added += unit.captured_slot_items.len();

        if has_veterancy(unit) {
            squad.veterancy_rank = squad.veterancy_rank.saturating_add(unit.vet_change);
            squad.veterancy_experience += unit.vet_experience;
            outcome.veterancy_updates += 1;
        }
    }

    debug!("finalized {}: {outcome:?}", company.name);
    Ok(outcome)
}

/// A finalized copy of a company waiting to be persisted.
#[derive(Debug)]
pub struct ResultFinalizer {
    staged: Company,
    outcome: FinalizeOutcome,
}

impl ResultFinalizer {
    /// Finalizes a clone of `company`. The original is never touched.
    pub fn stage(analysis: &MatchAnalysis, company: &Company) -> Result<Self, Error> {
        let mut staged = company.clone();
        let outcome = finalize(analysis, &mut staged)?;
        Ok(Self { staged, outcome })
    }

    pub fn outcome(&self) -> &FinalizeOutcome {
        &self.outcome
    }

    pub fn staged(&self) -> &Company {
        &self.staged
    }

    /// Hands the finalized company to `persist`, exactly once.
    pub fn synchronize<F>(self, persist: F) -> FinalizeOutcome
    where
        F: FnOnce(Company),
    {
        info!("synchronizing company {}", self.staged.name);
        persist(self.staged);
        self.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::lifecycle::CapturedEquipment;
    use crate::company::Squad;
    use crate::types::{BlueprintKind, BlueprintRef, SquadId};
    use std::time::Duration;

    const OWNER: PlayerId = PlayerId(100);

    fn company() -> Company {
        let mut company = Company::new("Guards Rifles", OWNER);
        company.squads.push(Squad::new(SquadId(0), "conscript_squad_bg"));
        company.squads.push(Squad::new(SquadId(1), "penal_battalion_bg"));
        company
    }

    fn unit(squad: u32, owner: Option<PlayerId>) -> UnitStatus {
        UnitStatus::new(SquadId(squad), owner, Duration::from_secs(1))
    }

    fn ppsh() -> BlueprintRef {
        BlueprintRef::new(BlueprintKind::Ibp, "ppsh41_assault_package_bg", 0)
    }

    fn panzer() -> BlueprintRef {
        BlueprintRef::new(BlueprintKind::Ebp, "panzer_iv_sdkfz_161_bg", 0)
    }

    #[test]
    fn captures_of_own_side_go_to_inventory() {
        let mut analysis = MatchAnalysis::default();
        analysis.captured_equipment.push(CapturedEquipment {
            side: Some(OWNER),
            blueprint: panzer(),
            capture_type: 0,
            captured_at: Duration::from_secs(10),
        });
        analysis.captured_equipment.push(CapturedEquipment {
            side: Some(PlayerId(200)),
            blueprint: panzer(),
            capture_type: 0,
            captured_at: Duration::from_secs(11),
        });

        let mut company = company();
        let outcome = finalize(&analysis, &mut company).unwrap();
        assert_eq!(outcome.equipment_added, 1);
        assert_eq!(company.inventory, vec![panzer()]);
    }

    #[test]
    fn picked_up_items_and_veterancy_land_on_squads() {
        let mut analysis = MatchAnalysis::default();
        let mut picked = unit(0, Some(OWNER));
        picked.captured_slot_items.push(ppsh());
        analysis.units.insert(SquadId(0), picked);
        let mut veteran = unit(1, None);
        veteran.vet_change = 2;
        veteran.vet_experience = 150.0;
        analysis.units.insert(SquadId(1), veteran);

        let mut company = company();
        let outcome = finalize(&analysis, &mut company).unwrap();
        assert_eq!(outcome.slot_items_added, 1);
        assert_eq!(outcome.veterancy_updates, 1);
        assert_eq!(company.squads[0].slot_items, vec![ppsh()]);
        assert_eq!(company.squads[1].veterancy_rank, 2);
        assert_eq!(company.squads[1].veterancy_experience, 150.0);
    }

    #[test]
    fn unknown_squad_fails_without_changes() {
        let mut analysis = MatchAnalysis::default();
        analysis.captured_equipment.push(CapturedEquipment {
            side: Some(OWNER),
            blueprint: panzer(),
            capture_type: 0,
            captured_at: Duration::from_secs(10),
        });
        let mut ghost = unit(9, Some(OWNER));
        ghost.captured_slot_items.push(ppsh());
        analysis.units.insert(SquadId(9), ghost);

        let mut company = company();
        let before = company.clone();
        let err = finalize(&analysis, &mut company).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnknownSquad(SquadId(9))));
        assert_eq!(company, before);
    }

    #[test]
    fn other_players_units_are_ignored() {
        let mut analysis = MatchAnalysis::default();
        let mut enemy = unit(9, Some(PlayerId(200)));
        enemy.captured_slot_items.push(ppsh());
        analysis.units.insert(SquadId(9), enemy);

        let mut company = company();
        let outcome = finalize(&analysis, &mut company).unwrap();
        assert_eq!(outcome, FinalizeOutcome::default());
    }

    #[test]
    fn finalizing_twice_duplicates_inventory() {
        let mut analysis = MatchAnalysis::default();
        analysis.captured_equipment.push(CapturedEquipment {
            side: Some(OWNER),
            blueprint: panzer(),
            capture_type: 0,
            captured_at: Duration::from_secs(10),
        });

        let mut company = company();
        finalize(&analysis, &mut company).unwrap();
        finalize(&analysis, &mut company).unwrap();
        assert_eq!(company.inventory.len(), 2);
    }

    #[test]
    fn synchronize_persists_staged_copy_once() {
        let mut analysis = MatchAnalysis::default();
        analysis.captured_equipment.push(CapturedEquipment {
            side: Some(OWNER),
            blueprint: panzer(),
            capture_type: 0,
            captured_at: Duration::from_secs(10),
        });

        let original = company();
        let finalizer = ResultFinalizer::stage(&analysis, &original).unwrap();
        assert!(original.inventory.is_empty());
        assert_eq!(finalizer.staged().inventory.len(), 1);

        let mut saved = Vec::new();
        let outcome = finalizer.synchronize(|company| saved.push(company));
        assert_eq!(outcome.equipment_added, 1);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].inventory, vec![panzer()]);
    }
}
