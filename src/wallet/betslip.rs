//! Bet slip accumulation and placement
//!
//! The slip is display-side arithmetic only: the server recomputes odds and
//! payout authoritatively at submission, and its echoed balance is what the
//! ledger trusts.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::common::errors::{ErrorKind, ServiceError, ServiceResult};
use crate::common::types::{BetSelection, SelectionKey};
use crate::gateway::messages::{PlaceBetRequest, PlaceBetResponse};
use crate::gateway::RestClient;

use super::store::WalletBalanceStore;

/// Minimum stake accepted at submission
pub const MIN_STAKE: Decimal = Decimal::ONE;

/// Slip lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlipPhase {
    Empty,
    Building,
    Submitting,
}

#[derive(Debug, Clone)]
struct SlipState {
    selections: Vec<BetSelection>,
    stake: Decimal,
    promo_code: Option<String>,
    phase: SlipPhase,
}

impl SlipState {
    fn empty() -> Self {
        Self {
            selections: Vec::new(),
            stake: Decimal::ZERO,
            promo_code: None,
            phase: SlipPhase::Empty,
        }
    }
}

/// Aggregates selections into a slip and submits it
pub struct BetSlipAggregator {
    rest: Arc<RestClient>,
    wallet: Arc<WalletBalanceStore>,
    state: RwLock<SlipState>,
    /// Global stake ceiling, applied on top of the balance bound
    max_stake: Decimal,
}

impl BetSlipAggregator {
    pub fn new(rest: Arc<RestClient>, wallet: Arc<WalletBalanceStore>, max_stake: Decimal) -> Self {
        Self {
            rest,
            wallet,
            state: RwLock::new(SlipState::empty()),
            max_stake,
        }
    }

    pub fn phase(&self) -> SlipPhase {
        self.state.read().phase
    }

    pub fn selections(&self) -> Vec<BetSelection> {
        self.state.read().selections.clone()
    }

    pub fn selection_count(&self) -> usize {
        self.state.read().selections.len()
    }

    pub fn stake(&self) -> Decimal {
        self.state.read().stake
    }

    pub fn promo_code(&self) -> Option<String> {
        self.state.read().promo_code.clone()
    }

    pub fn set_promo_code(&self, code: Option<String>) {
        self.state.write().promo_code = code;
    }

    /// Add a selection, or replace the existing pick for the same market
    ///
    /// Replacement keeps the selection's position in the slip. Mutations are
    /// refused while a submission is in flight.
    pub fn add_selection(&self, selection: BetSelection) -> bool {
        let mut state = self.state.write();
        if state.phase == SlipPhase::Submitting {
            debug!("Slip is submitting, rejecting mutation");
            return false;
        }
        let key = selection.key();
        match state.selections.iter().position(|s| s.key() == key) {
            Some(pos) => {
                debug!(market = %key.market_key, "Replacing selection for already-picked market");
                state.selections[pos] = selection;
            }
            None => state.selections.push(selection),
        }
        state.phase = SlipPhase::Building;
        true
    }

    /// Remove the selection for a market; an emptied slip returns to EMPTY
    pub fn remove_selection(&self, key: &SelectionKey) -> bool {
        let mut state = self.state.write();
        if state.phase == SlipPhase::Submitting {
            return false;
        }
        let before = state.selections.len();
        state.selections.retain(|s| &s.key() != key);
        if state.selections.is_empty() && state.phase == SlipPhase::Building {
            state.phase = SlipPhase::Empty;
        }
        state.selections.len() != before
    }

    /// Reset the slip entirely
    pub fn clear(&self) {
        let mut state = self.state.write();
        if state.phase == SlipPhase::Submitting {
            return;
        }
        *state = SlipState::empty();
    }

    /// Manual stake edit: clamped to [0, min(balance, max stake)]
    ///
    /// Zero is a legal transient value here (the user may be mid-edit);
    /// submission enforces the minimum.
    pub fn set_stake(&self, amount: Decimal) {
        let upper = self.stake_ceiling();
        let clamped = amount.max(Decimal::ZERO).min(upper);
        self.state.write().stake = clamped;
    }

    /// Stake increment/decrement: the result never drops below the minimum
    /// stake, and never exceeds the balance
    ///
    /// Boundary: with a balance below the minimum stake the floor collapses
    /// to the balance itself, so a broke user's stake stays at zero and
    /// submission reports the shortfall rather than this path inventing an
    /// unaffordable stake.
    pub fn increment_stake(&self, delta: Decimal) {
        let upper = self.stake_ceiling();
        let floor = MIN_STAKE.min(upper);
        let mut state = self.state.write();
        state.stake = (state.stake + delta).max(floor).min(upper);
    }

    fn stake_ceiling(&self) -> Decimal {
        let balance = self.wallet.balance().unwrap_or(Decimal::ZERO);
        balance.min(self.max_stake)
    }

    /// Product of all selection odds
    pub fn accumulator_odds(&self) -> Decimal {
        self.state
            .read()
            .selections
            .iter()
            .fold(Decimal::ONE, |acc, s| acc * s.odds)
    }

    /// Stake × accumulator odds; display-only
    pub fn potential_win(&self) -> Decimal {
        self.stake() * self.accumulator_odds()
    }

    /// Submit the slip
    ///
    /// On success the slip clears and the echoed balance is applied. On
    /// failure the slip (selections, stake, promo) is untouched so the user
    /// retries without re-entering anything. Placement is deliberately not
    /// retried: the call moves money and is not idempotent.
    pub async fn place(&self) -> ServiceResult<PlaceBetResponse> {
        let request = {
            let mut state = self.state.write();
            self.check_guards(&state)?;

            state.phase = SlipPhase::Submitting;
            let odds = state
                .selections
                .iter()
                .fold(Decimal::ONE, |acc, s| acc * s.odds);
            PlaceBetRequest {
                bets: state.selections.clone(),
                stake: state.stake,
                accumulator_odds: odds,
                potential_win: state.stake * odds,
                promo_code: state.promo_code.clone(),
            }
        };

        info!(
            legs = request.bets.len(),
            stake = %request.stake,
            "Submitting bet slip"
        );

        match self.rest.place_bets(&request).await {
            Ok(response) => {
                self.wallet.apply_mutation_echo(response.new_balance);
                *self.state.write() = SlipState::empty();
                info!("Bet slip accepted");
                Ok(response)
            }
            Err(err) => {
                warn!(error = %err, "Bet placement failed, slip preserved");
                self.state.write().phase = SlipPhase::Building;
                Err(ServiceError::from(err))
            }
        }
    }

    fn check_guards(&self, state: &SlipState) -> ServiceResult<()> {
        if !self.rest.has_token() {
            return Err(ServiceError::with_code(
                ErrorKind::Authentication,
                "auth_required",
                "sign in to place bets",
            ));
        }
        if state.phase == SlipPhase::Submitting {
            return Err(ServiceError::with_code(
                ErrorKind::Conflict,
                "already_submitting",
                "a submission is already in flight",
            ));
        }
        let balance = self.wallet.balance().unwrap_or(Decimal::ZERO);
        // A balance that cannot cover the minimum stake reads as
        // "insufficient", not "below minimum": the stake floor collapsed in
        // increment_stake for exactly this case.
        if balance < MIN_STAKE {
            return Err(ServiceError::with_code(
                ErrorKind::Validation,
                "insufficient_balance",
                "balance cannot cover the minimum stake",
            ));
        }
        if state.stake < MIN_STAKE {
            return Err(ServiceError::with_code(
                ErrorKind::Validation,
                "below_minimum",
                "stake is below the minimum",
            ));
        }
        if state.stake > balance {
            return Err(ServiceError::with_code(
                ErrorKind::Validation,
                "insufficient_balance",
                "stake exceeds balance",
            ));
        }
        if state.selections.is_empty() {
            return Err(ServiceError::with_code(
                ErrorKind::Validation,
                "no_selections",
                "the slip is empty",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for BetSlipAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("BetSlipAggregator")
            .field("phase", &state.phase)
            .field("selections", &state.selections.len())
            .field("stake", &state.stake)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::MatchPhase;
    use crate::gateway::StaticTokenProvider;
    use rust_decimal_macros::dec;

    fn selection(match_id: &str, market: &str, bet_type: &str, odds: Decimal) -> BetSelection {
        BetSelection {
            match_id: match_id.to_string(),
            phase: MatchPhase::Prematch,
            market_key: market.to_string(),
            bet_type: bet_type.to_string(),
            odds,
            match_label: None,
        }
    }

    fn fixture(balance: Option<Decimal>) -> BetSlipAggregator {
        let rest = Arc::new(
            RestClient::new(
                "http://localhost:3001",
                Arc::new(StaticTokenProvider::new("tok")),
            )
            .unwrap(),
        );
        let wallet = Arc::new(WalletBalanceStore::new(rest.clone()));
        if let Some(balance) = balance {
            wallet.apply_confirmed(balance);
        }
        BetSlipAggregator::new(rest, wallet, dec!(10000))
    }

    #[test]
    fn test_accumulator_odds_is_exact_product() {
        let slip = fixture(Some(dec!(100)));
        slip.add_selection(selection("m1", "1x2", "home", dec!(1.50)));
        slip.add_selection(selection("m2", "1x2", "away", dec!(2.00)));
        slip.add_selection(selection("m3", "over_under_2.5", "over", dec!(1.80)));

        assert_eq!(slip.accumulator_odds(), dec!(5.4000));

        slip.set_stake(dec!(10));
        assert_eq!(slip.potential_win(), dec!(54.0000));
    }

    #[test]
    fn test_repeated_market_replaces_in_place() {
        let slip = fixture(Some(dec!(100)));
        slip.add_selection(selection("m1", "1x2", "home", dec!(1.50)));
        slip.add_selection(selection("m2", "1x2", "draw", dec!(3.10)));

        // New outcome for m1's market: replaces, count unchanged, position kept
        slip.add_selection(selection("m1", "1x2", "away", dec!(2.60)));

        assert_eq!(slip.selection_count(), 2);
        let selections = slip.selections();
        assert_eq!(selections[0].match_id, "m1");
        assert_eq!(selections[0].bet_type, "away");
        assert_eq!(selections[0].odds, dec!(2.60));
    }

    #[test]
    fn test_same_match_different_phase_is_separate() {
        let slip = fixture(Some(dec!(100)));
        slip.add_selection(selection("m1", "1x2", "home", dec!(1.50)));

        let mut live = selection("m1", "1x2", "home", dec!(1.70));
        live.phase = MatchPhase::Live;
        slip.add_selection(live);

        assert_eq!(slip.selection_count(), 2);
    }

    #[test]
    fn test_remove_last_selection_returns_to_empty() {
        let slip = fixture(Some(dec!(100)));
        let pick = selection("m1", "1x2", "home", dec!(1.50));
        let key = pick.key();
        slip.add_selection(pick);
        assert_eq!(slip.phase(), SlipPhase::Building);

        assert!(slip.remove_selection(&key));
        assert_eq!(slip.phase(), SlipPhase::Empty);
        assert!(!slip.remove_selection(&key));
    }

    #[test]
    fn test_manual_stake_clamps_to_zero_and_balance() {
        let slip = fixture(Some(dec!(100)));

        slip.set_stake(dec!(-5));
        assert_eq!(slip.stake(), dec!(0));

        slip.set_stake(dec!(250));
        assert_eq!(slip.stake(), dec!(100));

        slip.set_stake(dec!(0));
        assert_eq!(slip.stake(), dec!(0));
    }

    #[test]
    fn test_manual_stake_respects_global_max() {
        let rest = Arc::new(
            RestClient::new(
                "http://localhost:3001",
                Arc::new(StaticTokenProvider::new("tok")),
            )
            .unwrap(),
        );
        let wallet = Arc::new(WalletBalanceStore::new(rest.clone()));
        wallet.apply_confirmed(dec!(50000));
        let slip = BetSlipAggregator::new(rest, wallet, dec!(10000));

        slip.set_stake(dec!(20000));
        assert_eq!(slip.stake(), dec!(10000));
    }

    #[test]
    fn test_increment_never_drops_below_minimum() {
        let slip = fixture(Some(dec!(100)));

        // Starting from 0, a +0.50 increment lands on the floor of 1
        slip.increment_stake(dec!(0.50));
        assert_eq!(slip.stake(), dec!(1));

        // A decrement cannot go under the floor either
        slip.increment_stake(dec!(-5));
        assert_eq!(slip.stake(), dec!(1));

        slip.increment_stake(dec!(10));
        assert_eq!(slip.stake(), dec!(11));
    }

    #[test]
    fn test_increment_with_zero_balance_stays_at_zero() {
        let slip = fixture(Some(dec!(0)));

        // Floor collapses to min(1, balance) = 0; the stake cannot exceed
        // the balance even via increments
        slip.increment_stake(dec!(5));
        assert_eq!(slip.stake(), dec!(0));
    }

    #[test]
    fn test_increment_clamps_to_balance() {
        let slip = fixture(Some(dec!(20)));
        slip.increment_stake(dec!(50));
        assert_eq!(slip.stake(), dec!(20));
    }

    #[tokio::test]
    async fn test_place_rejects_without_selections() {
        let slip = fixture(Some(dec!(100)));
        slip.set_stake(dec!(10));

        let err = slip.place().await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("no_selections"));
        assert_eq!(slip.phase(), SlipPhase::Empty);
    }

    #[tokio::test]
    async fn test_place_rejects_below_minimum_stake() {
        let slip = fixture(Some(dec!(100)));
        slip.add_selection(selection("m1", "1x2", "home", dec!(1.50)));

        let err = slip.place().await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("below_minimum"));
        // Slip intact for retry
        assert_eq!(slip.selection_count(), 1);
    }

    #[tokio::test]
    async fn test_place_rejects_zero_balance_as_insufficient() {
        let slip = fixture(Some(dec!(0)));
        slip.add_selection(selection("m1", "1x2", "home", dec!(1.50)));
        slip.increment_stake(dec!(5)); // clamped to 0

        let err = slip.place().await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("insufficient_balance"));
    }

    #[tokio::test]
    async fn test_place_rejects_unauthenticated() {
        let rest = Arc::new(
            RestClient::new(
                "http://localhost:3001",
                Arc::new(StaticTokenProvider::anonymous()),
            )
            .unwrap(),
        );
        let wallet = Arc::new(WalletBalanceStore::new(rest.clone()));
        wallet.apply_confirmed(dec!(100));
        let slip = BetSlipAggregator::new(rest, wallet, dec!(10000));
        slip.add_selection(selection("m1", "1x2", "home", dec!(1.50)));
        slip.set_stake(dec!(10));

        let err = slip.place().await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("auth_required"));
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[test]
    fn test_mutations_refused_while_submitting() {
        let slip = fixture(Some(dec!(100)));
        slip.add_selection(selection("m1", "1x2", "home", dec!(1.50)));
        slip.state.write().phase = SlipPhase::Submitting;

        assert!(!slip.add_selection(selection("m2", "1x2", "home", dec!(2.0))));
        assert!(!slip.remove_selection(&SelectionKey {
            match_id: "m1".to_string(),
            phase: MatchPhase::Prematch,
            market_key: "1x2".to_string(),
        }));
        assert_eq!(slip.selection_count(), 1);
    }

    #[test]
    fn test_empty_slip_has_neutral_odds() {
        let slip = fixture(Some(dec!(100)));
        assert_eq!(slip.accumulator_odds(), Decimal::ONE);
        assert_eq!(slip.potential_win(), Decimal::ZERO);
    }
}
