//! Interactive operations invoked by the command front-end and billing.
//!
//! Every mutating operation runs inside a per-player transaction (two for
//! PvP) and refuses blocked identities before touching state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tycoon_logic::abuse::{claim_plausible, income_claim_ceiling, ActionKind};
use tycoon_logic::accrual::{
    business_income, crop_ready, crop_remaining_secs, harvest_value, income_per_cycle, max_energy,
    payable_cycles, planting_cost,
};
use tycoon_logic::catalogue::{BusinessKind, CropKind};
use tycoon_logic::constants::{modifier_names, time, upgrades};
use tycoon_logic::economy::{business_upgrade_cost, farm_slots_after_upgrade, farm_upgrade_cost};
use tycoon_logic::entitlements::{
    coin_purchase_bonus, energy_after_pack, vip_expiry, Entitlement, EXPERIENCE_BOOST_AMOUNT,
};
use tycoon_logic::modifiers::EffectiveModifiers;
use tycoon_logic::progression::scaled_experience;
use tycoon_logic::pvp::{
    check_eligibility, narrative, power_score, resolve_battle, AttackContext, PowerInput,
};

use crate::error::GameError;
use crate::game::Game;
use crate::store::Txn;
use crate::tables::{
    AssetId, BattleRecord, Business, EntryKind, Farm, Identity, Player, PlayerId, PlayerState,
    VipStatus,
};

/// Result of a successful collection or harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collected {
    pub asset: AssetId,
    pub amount: i64,
}

/// Result of granting experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantOutcome {
    pub leveled_up: bool,
    pub levels_gained: u32,
    pub level: u32,
}

impl Game {
    // ========================================================================
    // PLAYERS
    // ========================================================================

    /// Look up a player by external identity, creating it on first contact
    /// with the starting balance and one empty farm plot.
    pub fn get_or_create_player(
        &self,
        identity: Identity,
        username: &str,
    ) -> Result<Player, GameError> {
        let now = self.now();
        let (id, created) = self.store.insert_if_absent(identity, |id| PlayerState {
            player: Player {
                id,
                identity,
                username: username.to_string(),
                coins: self.config.starting_coins,
                energy: self.config.starting_energy,
                level: 1,
                experience: 0,
                last_energy_update: now,
                last_daily_bonus: None,
                created_at: now,
                vip: None,
                total_earned: 0,
                total_spent: 0,
                pvp_wins: 0,
                pvp_losses: 0,
            },
            businesses: Vec::new(),
            farms: vec![Farm {
                id: self.store.next_asset_id(),
                owner: id,
                crop: None,
                planted_at: None,
                slots: self.config.starting_farm_slots,
                level: 1,
                created_at: now,
            }],
        });
        if created {
            log::info!("New player {} '{}' for identity {}", id, username, identity);
        }
        self.player(id)
    }

    /// Delete a player with its assets and ledger entries.
    pub fn remove_player(&self, player: PlayerId) -> Result<(), GameError> {
        let handle = self.store.handle(player)?;
        let guard = self.store.lock(&handle, player)?;
        self.store.remove(&guard);
        let removed = self.ledger.remove_player(player);
        self.cooldowns
            .lock()
            .retain(|(a, d), _| *a != player && *d != player);
        log::info!("Removed player {} and {} ledger entries", player, removed);
        Ok(())
    }

    /// Apply pending regeneration and return the resulting energy.
    pub fn refresh_energy(&self, player: PlayerId) -> Result<i64, GameError> {
        self.transact(player, |txn| {
            if self.guard.is_blocked(txn.identity()) {
                return Err(GameError::Blocked(txn.identity()));
            }
            let mods = self.modifiers_at(txn.now);
            self.regen_energy(txn, &mods);
            Ok(txn.state.player.energy)
        })
    }

    pub fn claim_daily_bonus(&self, player: PlayerId) -> Result<i64, GameError> {
        self.transact(player, |txn| {
            self.gate(txn.identity(), ActionKind::Other)?;
            let now = txn.now;
            if let Some(last) = txn.state.player.last_daily_bonus {
                let since = (now - last).num_seconds();
                if since < time::DAY {
                    return Err(GameError::OnCooldown {
                        remaining_secs: time::DAY - since,
                    });
                }
            }
            txn.state.player.last_daily_bonus = Some(now);
            txn.credit(self.config.daily_bonus, EntryKind::Income, "Daily bonus")?;
            Ok(self.config.daily_bonus)
        })
    }

    // ========================================================================
    // BUSINESSES
    // ========================================================================

    pub fn buy_asset(&self, player: PlayerId, kind: &str) -> Result<Business, GameError> {
        let kind =
            BusinessKind::from_name(kind).ok_or_else(|| GameError::UnknownKind(kind.to_string()))?;
        let business = self.transact(player, |txn| {
            self.gate(txn.identity(), ActionKind::BuyBusiness)?;
            let mods = self.modifiers_at(txn.now);
            let spec = kind.spec();
            let cost = scaled_cost(
                spec.cost,
                mods.factor(modifier_names::BUSINESS_COST_MULTIPLIER),
            );
            txn.debit(cost, EntryKind::Expense, format!("Bought {}", spec.name))?;
            let business = Business {
                id: self.store.next_asset_id(),
                owner: player,
                kind,
                level: 1,
                last_collection: txn.now,
                created_at: txn.now,
            };
            txn.state.businesses.push(business.clone());
            Ok(business)
        })?;
        self.store.index_asset(business.id, player);
        log::info!(
            "Player {} bought {} (asset {})",
            player,
            kind.spec().name,
            business.id
        );
        Ok(business)
    }

    /// Collect a business's income or harvest a farm plot.
    ///
    /// A zero amount is reported as [`GameError::NothingToCollect`].
    pub fn collect_asset(
        &self,
        asset: AssetId,
        requester: Identity,
    ) -> Result<Collected, GameError> {
        self.gate(requester, ActionKind::CollectBusiness)?;
        let owner = self.store.owner_of(asset)?;
        let result = self.transact(owner, |txn| {
            check_owner(txn, asset, requester)?;
            let mods = self.modifiers_at(txn.now);
            if txn.state.business(asset).is_some() {
                self.collect_business_locked(txn, asset, &mods)
            } else {
                self.harvest_locked(txn, asset, &mods)
            }
        });
        match result {
            Ok(amount) => {
                log::debug!("Asset {} collected {} coins", asset, amount);
                Ok(Collected { asset, amount })
            }
            Err(GameError::NothingToCollect) => {
                log::debug!("Asset {} had nothing to collect", asset);
                Err(GameError::NothingToCollect)
            }
            Err(err) => Err(err),
        }
    }

    /// Collection shared by interactive calls and the backlog sweep. The
    /// caller holds the owner's lock.
    pub(crate) fn collect_business_locked(
        &self,
        txn: &mut Txn,
        asset: AssetId,
        mods: &EffectiveModifiers,
    ) -> Result<i64, GameError> {
        let now = txn.now;
        let multiplier = self.income_multiplier(&txn.state.player, mods, now);
        let business = txn
            .state
            .business(asset)
            .ok_or_else(|| GameError::not_found("business", asset.0))?;
        let (kind, level) = (business.kind, business.level);
        let elapsed = (now - business.last_collection).num_seconds();
        let cap = self.config.max_backlog_cycles;

        let amount = business_income(kind, level, elapsed, multiplier, cap);
        if amount <= 0 {
            return Err(GameError::NothingToCollect);
        }
        let ceiling = income_claim_ceiling(
            income_per_cycle(kind, level),
            payable_cycles(kind, elapsed, cap),
            multiplier,
            self.config.plausibility_margin,
        );
        if !claim_plausible(amount, ceiling) {
            self.guard.reject_claim(txn.identity(), amount, ceiling, now);
            return Err(GameError::ValidationFailed {
                claimed: amount,
                ceiling,
            });
        }

        if let Some(business) = txn.state.business_mut(asset) {
            business.last_collection = now;
        }
        txn.credit(
            amount,
            EntryKind::Income,
            format!("{} income", kind.spec().name),
        )?;
        Ok(amount)
    }

    /// Check an externally claimed income amount for a business against the
    /// most it could have produced. Returns the ceiling when plausible.
    pub fn validate_income_claim(&self, asset: AssetId, claimed: i64) -> Result<i64, GameError> {
        let owner = self.store.owner_of(asset)?;
        let state = self.player_state(owner)?;
        let now = self.now();
        let mods = self.modifiers_at(now);
        let business = state
            .business(asset)
            .ok_or_else(|| GameError::not_found("business", asset.0))?;
        let elapsed = (now - business.last_collection).num_seconds();
        let multiplier = self.income_multiplier(&state.player, &mods, now);
        let ceiling = income_claim_ceiling(
            income_per_cycle(business.kind, business.level),
            payable_cycles(business.kind, elapsed, self.config.max_backlog_cycles),
            multiplier,
            self.config.plausibility_margin,
        );
        if !claim_plausible(claimed, ceiling) {
            self.guard
                .reject_claim(state.player.identity, claimed, ceiling, now);
            return Err(GameError::ValidationFailed { claimed, ceiling });
        }
        Ok(ceiling)
    }

    /// Raise a business one level. Pending income is collected first at the
    /// old level.
    pub fn upgrade_business(
        &self,
        asset: AssetId,
        requester: Identity,
    ) -> Result<Business, GameError> {
        self.gate(requester, ActionKind::Upgrade)?;
        let owner = self.store.owner_of(asset)?;
        self.transact(owner, |txn| {
            check_owner(txn, asset, requester)?;
            let mods = self.modifiers_at(txn.now);
            match self.collect_business_locked(txn, asset, &mods) {
                Ok(_) | Err(GameError::NothingToCollect) => {}
                Err(err) => return Err(err),
            }
            let (kind, level) = txn
                .state
                .business(asset)
                .map(|b| (b.kind, b.level))
                .ok_or_else(|| GameError::not_found("business", asset.0))?;

            txn.debit(
                business_upgrade_cost(kind, level),
                EntryKind::Expense,
                format!("Upgraded {} to level {}", kind.spec().name, level + 1),
            )?;
            self.regen_energy(txn, &mods);
            txn.spend_energy(upgrades::BUSINESS_ENERGY)?;

            let upgraded = match txn.state.business_mut(asset) {
                Some(business) => {
                    business.level += 1;
                    business.clone()
                }
                None => return Err(GameError::not_found("business", asset.0)),
            };
            let gain = self.experience_gain(upgrades::BUSINESS_EXPERIENCE, &mods, false);
            self.add_experience(txn, gain)?;
            Ok(upgraded)
        })
    }

    // ========================================================================
    // FARMS
    // ========================================================================

    pub fn plant_crop(
        &self,
        asset: AssetId,
        requester: Identity,
        crop: &str,
    ) -> Result<Farm, GameError> {
        self.gate(requester, ActionKind::PlantCrop)?;
        let crop =
            CropKind::from_name(crop).ok_or_else(|| GameError::UnknownKind(crop.to_string()))?;
        let owner = self.store.owner_of(asset)?;
        self.transact(owner, |txn| {
            check_owner(txn, asset, requester)?;
            let farm = txn
                .state
                .farm(asset)
                .ok_or_else(|| GameError::not_found("farm", asset.0))?;
            if farm.crop.is_some() {
                return Err(GameError::PlotOccupied(asset));
            }
            let slots = farm.slots;
            txn.debit(
                planting_cost(crop, slots),
                EntryKind::Expense,
                format!("Planted {} x{}", crop.spec().name, slots),
            )?;
            let now = txn.now;
            match txn.state.farm_mut(asset) {
                Some(farm) => {
                    farm.crop = Some(crop);
                    farm.planted_at = Some(now);
                    Ok(farm.clone())
                }
                None => Err(GameError::not_found("farm", asset.0)),
            }
        })
    }

    pub fn harvest_crop(
        &self,
        asset: AssetId,
        requester: Identity,
    ) -> Result<Collected, GameError> {
        self.gate(requester, ActionKind::HarvestCrop)?;
        let owner = self.store.owner_of(asset)?;
        let amount = self.transact(owner, |txn| {
            check_owner(txn, asset, requester)?;
            let mods = self.modifiers_at(txn.now);
            self.harvest_locked(txn, asset, &mods)
        })?;
        Ok(Collected { asset, amount })
    }

    fn harvest_locked(
        &self,
        txn: &mut Txn,
        asset: AssetId,
        mods: &EffectiveModifiers,
    ) -> Result<i64, GameError> {
        let now = txn.now;
        let speed = self.speed_multiplier(&txn.state.player, mods, now);
        let farm = txn
            .state
            .farm(asset)
            .ok_or_else(|| GameError::not_found("asset", asset.0))?;
        let crop = farm.crop.ok_or(GameError::NothingToCollect)?;
        let elapsed = farm
            .planted_at
            .map(|at| (now - at).num_seconds())
            .unwrap_or(0);
        if !crop_ready(crop, elapsed, speed) {
            return Err(GameError::CropNotReady {
                remaining_secs: crop_remaining_secs(crop, elapsed, speed),
            });
        }
        let slots = farm.slots;
        let value = harvest_value(crop, slots, mods.factor(modifier_names::PRICE_MULTIPLIER));

        if let Some(farm) = txn.state.farm_mut(asset) {
            farm.crop = None;
            farm.planted_at = None;
        }
        txn.credit(
            value,
            EntryKind::Income,
            format!("Harvested {} x{}", crop.spec().name, slots),
        )?;
        let gain = self.experience_gain(
            upgrades::HARVEST_EXPERIENCE_PER_SLOT * u64::from(slots),
            mods,
            false,
        );
        self.add_experience(txn, gain)?;
        Ok(value)
    }

    pub fn upgrade_farm(&self, asset: AssetId, requester: Identity) -> Result<Farm, GameError> {
        self.gate(requester, ActionKind::Upgrade)?;
        let owner = self.store.owner_of(asset)?;
        self.transact(owner, |txn| {
            check_owner(txn, asset, requester)?;
            let mods = self.modifiers_at(txn.now);
            let level = txn
                .state
                .farm(asset)
                .map(|f| f.level)
                .ok_or_else(|| GameError::not_found("farm", asset.0))?;

            txn.debit(
                farm_upgrade_cost(level),
                EntryKind::Expense,
                format!("Upgraded farm to level {}", level + 1),
            )?;
            self.regen_energy(txn, &mods);
            txn.spend_energy(upgrades::FARM_ENERGY)?;

            let upgraded = match txn.state.farm_mut(asset) {
                Some(farm) => {
                    farm.level += 1;
                    farm.slots = farm_slots_after_upgrade(farm.slots);
                    farm.clone()
                }
                None => return Err(GameError::not_found("farm", asset.0)),
            };
            let gain = self.experience_gain(upgrades::FARM_EXPERIENCE, &mods, false);
            self.add_experience(txn, gain)?;
            Ok(upgraded)
        })
    }

    // ========================================================================
    // PROGRESSION & ENTITLEMENTS
    // ========================================================================

    /// Grant raw experience, cascading level-ups.
    pub fn grant_experience(
        &self,
        player: PlayerId,
        amount: u64,
    ) -> Result<GrantOutcome, GameError> {
        self.transact(player, |txn| {
            if self.guard.is_blocked(txn.identity()) {
                return Err(GameError::Blocked(txn.identity()));
            }
            let progression = self.add_experience(txn, amount)?;
            Ok(GrantOutcome {
                leveled_up: progression.leveled_up(),
                levels_gained: progression.level_ups.len() as u32,
                level: progression.level,
            })
        })
    }

    /// Apply a purchase confirmed by billing.
    pub fn credit_entitlement(
        &self,
        player: PlayerId,
        entitlement: &Entitlement,
    ) -> Result<(), GameError> {
        self.transact(player, |txn| {
            if self.guard.is_blocked(txn.identity()) {
                return Err(GameError::Blocked(txn.identity()));
            }
            let now = txn.now;
            match entitlement {
                Entitlement::Vip { tier, days } => {
                    let current = txn.state.player.vip.map(|v| v.expires_at.timestamp());
                    let expiry = vip_expiry(current, now.timestamp(), *days);
                    let expires_at = DateTime::from_timestamp(expiry, 0).ok_or_else(|| {
                        GameError::InvalidState(format!("VIP expiry {} out of range", expiry))
                    })?;
                    txn.state.player.vip = Some(VipStatus {
                        tier: *tier,
                        expires_at,
                    });
                    let benefits = tier.benefits();
                    txn.credit(
                        benefits.welcome_bonus,
                        EntryKind::Income,
                        format!("Purchase: VIP {} welcome bonus", benefits.name),
                    )?;
                }
                Entitlement::Coins { amount } => {
                    if *amount <= 0 {
                        return Err(GameError::InvalidState(format!(
                            "coin purchase of {}",
                            amount
                        )));
                    }
                    let total = amount
                        .checked_add(coin_purchase_bonus(*amount))
                        .ok_or_else(|| {
                            GameError::InvalidState(format!("coin purchase of {}", amount))
                        })?;
                    txn.credit(
                        total,
                        EntryKind::Income,
                        format!("Purchase: {} coins", amount),
                    )?;
                }
                Entitlement::EnergyPack => {
                    let mods = self.modifiers_at(now);
                    self.regen_energy(txn, &mods);
                    let player = &mut txn.state.player;
                    let cap = max_energy(self.config.max_energy, player.active_vip(now));
                    player.energy = energy_after_pack(player.energy, cap);
                }
                Entitlement::ExperienceBoost => {
                    self.add_experience(txn, EXPERIENCE_BOOST_AMOUNT)?;
                }
            }
            log::info!("Credited {} to player {}", entitlement.describe(), player);
            Ok(())
        })
    }

    // ========================================================================
    // PVP
    // ========================================================================

    /// Resolve an attack under both players' locks, taken in ascending id
    /// order. The fee and energy are charged whatever the outcome.
    pub fn attempt_attack(
        &self,
        attacker: PlayerId,
        defender: PlayerId,
    ) -> Result<BattleRecord, GameError> {
        if attacker == defender {
            return Err(GameError::SelfAttack);
        }
        let attacker_handle = self.store.handle(attacker)?;
        let defender_handle = self.store.handle(defender)?;
        let (mut attacker_guard, mut defender_guard) = if attacker < defender {
            let a = self.store.lock(&attacker_handle, attacker)?;
            let d = self.store.lock(&defender_handle, defender)?;
            (a, d)
        } else {
            let d = self.store.lock(&defender_handle, defender)?;
            let a = self.store.lock(&attacker_handle, attacker)?;
            (a, d)
        };

        let now = self.now();
        let mut att = Txn::begin(&attacker_guard, now);
        let mut def = Txn::begin(&defender_guard, now);
        self.gate(att.identity(), ActionKind::PvpAttack)?;

        let mods = self.modifiers_at(now);
        self.regen_energy(&mut att, &mods);
        let free_energy = mods.has_flag(modifier_names::FREE_ENERGY);
        let since_last_attack_secs = self
            .cooldowns
            .lock()
            .get(&(attacker, defender))
            .map(|at| (now - *at).num_seconds());

        let ctx = AttackContext {
            attacker_id: attacker.0,
            defender_id: defender.0,
            attacker_level: att.state.player.level,
            defender_level: def.state.player.level,
            attacker_coins: att.state.player.coins,
            attacker_energy: att.state.player.energy,
            defender_coins: def.state.player.coins,
            since_last_attack_secs,
            free_energy,
        };
        check_eligibility(&ctx, &self.config.pvp)?;

        let attacker_power = power_score(&power_input(&att.state, now));
        let defender_power = power_score(&power_input(&def.state, now));
        let attacker_name = att.state.player.username.clone();
        let defender_name = def.state.player.username.clone();

        att.debit(
            self.config.pvp.attack_cost,
            EntryKind::Expense,
            format!("Attack on {}", defender_name),
        )?;
        if !free_energy {
            att.spend_energy(self.config.pvp.attack_energy)?;
        }

        let battle_id = self.next_battle_id();
        let (outcome, log_lines) = self.with_rng(|rng| {
            let outcome = resolve_battle(
                attacker_power,
                defender_power,
                def.state.player.coins,
                &self.config.pvp,
                rng,
            );
            let lines = narrative(&attacker_name, &defender_name, &outcome, rng);
            (outcome, lines)
        });

        let winner = if outcome.attacker_wins {
            let stolen = outcome.stolen.min(def.state.player.coins);
            def.debit_linked(
                stolen,
                EntryKind::PvpLoss,
                format!("Robbed by {}", attacker_name),
                Some(battle_id),
            )?;
            att.credit_linked(
                stolen,
                EntryKind::PvpWin,
                format!("Robbed {}", defender_name),
                Some(battle_id),
            )?;
            att.state.player.pvp_wins += 1;
            def.state.player.pvp_losses += 1;
            let gain = self.experience_gain(self.config.winner_experience, &mods, true);
            self.add_experience(&mut att, gain)?;
            attacker
        } else {
            def.state.player.pvp_wins += 1;
            att.state.player.pvp_losses += 1;
            let gain = self.experience_gain(self.config.defender_experience, &mods, true);
            self.add_experience(&mut def, gain)?;
            defender
        };

        let record = BattleRecord {
            id: battle_id,
            attacker,
            defender,
            winner,
            amount_stolen: if outcome.attacker_wins {
                outcome.stolen
            } else {
                0
            },
            attacker_power: outcome.attacker_power,
            defender_power: outcome.defender_power,
            log: log_lines,
            created_at: now,
        };

        let (attacker_state, mut entries) = att.into_parts();
        let (defender_state, defender_entries) = def.into_parts();
        entries.extend(defender_entries);
        self.ledger.append(entries, now);
        *attacker_guard = attacker_state;
        *defender_guard = defender_state;
        self.cooldowns.lock().insert((attacker, defender), now);
        self.battles.lock().push(record.clone());

        log::info!(
            "Battle {}: {} attacked {}, winner {}, {} coins moved",
            battle_id,
            attacker,
            defender,
            winner,
            record.amount_stolen
        );
        Ok(record)
    }

    // ========================================================================
    // MODIFIERS & GUARD
    // ========================================================================

    /// The modifiers in force right now.
    pub fn query_active_modifiers(&self) -> EffectiveModifiers {
        self.modifiers_at(self.now())
    }

    pub fn rate_limit_check(&self, identity: Identity) -> bool {
        self.guard.rate_limit_check(identity, self.now())
    }

    pub fn is_blocked(&self, identity: Identity) -> bool {
        self.guard.is_blocked(identity)
    }

    pub fn unblock(&self, identity: Identity, admin: &str) -> bool {
        self.guard.unblock(identity, admin, self.now())
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// Window income factor times the owner's VIP factor.
    fn income_multiplier(
        &self,
        player: &Player,
        mods: &EffectiveModifiers,
        now: DateTime<Utc>,
    ) -> f64 {
        let vip = player
            .active_vip(now)
            .map(|t| t.benefits().income_multiplier)
            .unwrap_or(1.0);
        mods.factor(modifier_names::INCOME_MULTIPLIER) * vip
    }

    fn speed_multiplier(
        &self,
        player: &Player,
        mods: &EffectiveModifiers,
        now: DateTime<Utc>,
    ) -> f64 {
        let vip = player
            .active_vip(now)
            .map(|t| t.benefits().speed_boost)
            .unwrap_or(1.0);
        mods.factor(modifier_names::SPEED_BOOST) * vip
    }

    fn experience_gain(&self, base: u64, mods: &EffectiveModifiers, pvp: bool) -> u64 {
        let mut factor = mods.factor(modifier_names::EXPERIENCE_MULTIPLIER);
        if pvp {
            factor *= mods.factor(modifier_names::PVP_EXPERIENCE_MULTIPLIER);
        }
        scaled_experience(base, factor)
    }
}

fn check_owner(txn: &Txn, asset: AssetId, requester: Identity) -> Result<(), GameError> {
    if txn.identity() != requester {
        return Err(GameError::NotOwner(asset));
    }
    Ok(())
}

pub(crate) fn power_input(state: &PlayerState, now: DateTime<Utc>) -> PowerInput {
    PowerInput {
        level: state.player.level,
        businesses: state.businesses.len(),
        farm_levels: state.farms.iter().map(|f| f.level).collect(),
        coins: state.player.coins,
        vip: state.player.active_vip(now),
    }
}

fn scaled_cost(base: i64, factor: f64) -> i64 {
    (base as f64 * factor.max(0.0)).floor() as i64
}
