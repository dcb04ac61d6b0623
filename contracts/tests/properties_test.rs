//! Property tests for pricing and reserve accounting.
//!
//! - Quotes scale linearly with quantity.
//! - Surplus withdrawal either fails with `LowReserves` or leaves the vault
//!   holding exactly its required reserve.
//! - Any failed operation leaves a snapshot of the engine unchanged.

use proptest::prelude::*;
use reserve_contracts::{
    AuthorizedAction, CreditLedger, DefaultEngine, PriceTable, ReserveInputs, SettlementError,
    VoucherSigner,
};
use reserve_protocol::crypto::SignerKeypair;
use reserve_protocol::ledger::{AccountId, AssetId};
use reserve_protocol::EngineConfig;

// ============================================================================
// SNAPSHOT FOR "NO MUTATION ON ERROR" CHECKING
// ============================================================================

const HOLDERS: [&str; 3] = ["alice", "bob", "carol"];

/// Every figure an operation could touch.
#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    payments: Vec<u64>,
    credits: Vec<u64>,
    credit_supply: u64,
    vault: u64,
    treasury: u64,
    events: usize,
}

impl Snapshot {
    fn take(engine: &DefaultEngine) -> Self {
        let asset = engine.payment_asset();
        let mut accounts: Vec<AccountId> = HOLDERS.iter().map(|h| AccountId::from(*h)).collect();
        accounts.push(engine.desk().account().clone());
        accounts.push(engine.vault().account().clone());
        accounts.push(engine.config().admin());

        Self {
            payments: accounts
                .iter()
                .map(|a| engine.payment_balance(&asset, a))
                .collect(),
            credits: accounts.iter().map(|a| engine.credit_balance(a)).collect(),
            credit_supply: engine.credits().total_supply(),
            vault: engine.vault_balance(),
            treasury: engine.treasury_balance(),
            events: engine.events().len(),
        }
    }
}

// ============================================================================
// ACTIONS
// ============================================================================

#[derive(Debug, Clone)]
enum Action {
    Buy { holder: usize, quantity: u64 },
    Redeem { holder: usize, quantity: u64 },
    Consume { holder: usize, quantity: u64 },
    FundVault { amount: u64 },
    FundTreasury { amount: u64 },
    SetPrice { price: u64 },
    Withdraw,
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => (0..HOLDERS.len(), 0u64..20).prop_map(|(holder, quantity)| Action::Buy { holder, quantity }),
        3 => (0..HOLDERS.len(), 0u64..20).prop_map(|(holder, quantity)| Action::Redeem { holder, quantity }),
        1 => (0..HOLDERS.len(), 0u64..10).prop_map(|(holder, quantity)| Action::Consume { holder, quantity }),
        2 => (0u64..2_000_000).prop_map(|amount| Action::FundVault { amount }),
        1 => (0u64..2_000_000).prop_map(|amount| Action::FundTreasury { amount }),
        1 => (0u64..200_000).prop_map(|price| Action::SetPrice { price }),
        2 => Just(Action::Withdraw),
    ]
}

struct World {
    engine: DefaultEngine,
    signer: VoucherSigner,
    asset: AssetId,
    owner: AccountId,
    nonce: u64,
}

impl World {
    fn new() -> Self {
        let config = EngineConfig::default();
        let signer = VoucherSigner::new(
            SignerKeypair::from_seed(&[5u8; 32]),
            config.voucher_domain.clone(),
        );
        let mut engine = DefaultEngine::with_defaults(config, signer.public_key()).unwrap();
        let owner = engine.config().admin();
        let asset = engine.payment_asset();
        engine.set_price(&owner, asset, 70_000).unwrap();

        // holders start with plenty of payment asset and standing approvals
        let desk = engine.desk().account().clone();
        let vault = engine.vault().account().clone();
        for h in HOLDERS {
            let holder = AccountId::from(h);
            engine.issue_payment(&asset, &holder, 1_000_000_000).unwrap();
            engine.approve_payment(&asset, &holder, &desk, u64::MAX);
            engine.approve_credit(&holder, &vault, u64::MAX).unwrap();
        }

        Self {
            engine,
            signer,
            asset,
            owner,
            nonce: 0,
        }
    }

    fn apply(&mut self, action: &Action) -> Result<(), SettlementError> {
        let asset = self.asset;
        match *action {
            Action::Buy { holder, quantity } => {
                self.engine.buy(&holder_id(holder), &asset, quantity)?;
            }
            Action::Redeem { holder, quantity } => {
                let holder = holder_id(holder);
                self.nonce += 1;
                let proof =
                    self.signer
                        .issue(AuthorizedAction::Redeem, &holder, quantity, self.nonce, 600);
                self.engine.redeem(&holder, quantity, &proof)?;
            }
            Action::Consume { holder, quantity } => {
                let holder = holder_id(holder);
                self.nonce += 1;
                let proof =
                    self.signer
                        .issue(AuthorizedAction::Consume, &holder, quantity, self.nonce, 600);
                self.engine.consume(&holder, quantity, &proof)?;
            }
            Action::FundVault { amount } => {
                let vault = self.engine.vault().account().clone();
                self.fund(&vault, amount)?;
            }
            Action::FundTreasury { amount } => {
                let desk = self.engine.desk().account().clone();
                self.fund(&desk, amount)?;
            }
            Action::SetPrice { price } => {
                let owner = self.owner.clone();
                self.engine.set_price(&owner, asset, price)?;
            }
            Action::Withdraw => {
                let owner = self.owner.clone();
                self.engine.withdraw(&owner)?;
            }
        }
        Ok(())
    }

    fn fund(&mut self, to: &AccountId, amount: u64) -> Result<(), SettlementError> {
        let donor = AccountId::from("donor");
        self.engine.issue_payment(&self.asset, &donor, amount)?;
        self.engine.transfer_payment(&self.asset, &donor, to, amount)
    }
}

fn holder_id(index: usize) -> AccountId {
    AccountId::from(HOLDERS[index])
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn quote_is_quantity_times_price(quantity in 1u64..1_000_000, price in 1u64..1_000_000_000) {
        let asset = AssetId::derive("USDC", "devnet");
        let mut table = PriceTable::new();
        table.set(asset, price, AccountId::from("owner"));
        prop_assert_eq!(table.quote(&asset, quantity), Ok(quantity * price));
    }

    #[test]
    fn quote_overflow_is_an_error(quantity in 2u64..u64::MAX, price in (u64::MAX / 2 + 1)..u64::MAX) {
        let asset = AssetId::derive("USDC", "devnet");
        let mut table = PriceTable::new();
        table.set(asset, price, AccountId::from("owner"));
        let is_overflow = matches!(table.quote(&asset, quantity), Err(SettlementError::Overflow { .. }));
        prop_assert!(is_overflow);
    }

    #[test]
    fn surplus_never_breaches_requirement(
        vault_balance in 0u64..u64::MAX / 4,
        outstanding_supply in 0u64..1_000_000,
        price in 0u64..1_000_000,
    ) {
        let inputs = ReserveInputs { vault_balance, outstanding_supply, price };
        let required = outstanding_supply * price;
        match inputs.withdrawable_surplus() {
            Ok(surplus) => prop_assert_eq!(vault_balance - surplus, required),
            Err(SettlementError::LowReserves { required: r, available }) => {
                prop_assert_eq!(r, required);
                prop_assert!(available < required);
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
        prop_assert_eq!(inputs.available_balance(), Ok(vault_balance.saturating_sub(required)));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn failed_actions_leave_no_trace(actions in prop::collection::vec(action_strategy(), 1..40)) {
        let mut world = World::new();
        for action in &actions {
            let before = Snapshot::take(&world.engine);
            if world.apply(action).is_err() {
                prop_assert_eq!(Snapshot::take(&world.engine), before, "after {:?}", action);
            }
        }
    }

    #[test]
    fn withdraw_leaves_exactly_the_requirement(actions in prop::collection::vec(action_strategy(), 1..40)) {
        let mut world = World::new();
        for action in &actions {
            let _ = world.apply(action);
        }

        let owner = world.owner.clone();
        match world.engine.withdraw(&owner) {
            Ok(_) => {
                let required = world.engine.required_reserve().unwrap();
                prop_assert_eq!(world.engine.vault_balance(), required);
                prop_assert_eq!(world.engine.available_balance(), Ok(0));
            }
            Err(SettlementError::LowReserves { required, available }) => {
                prop_assert!(available < required);
                prop_assert_eq!(available, world.engine.vault_balance());
            }
            // the last price change may have disabled the asset
            Err(SettlementError::UnsupportedAsset(_)) => {
                prop_assert!(world.engine.quote_cost(&world.asset, 1).is_err());
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    #[test]
    fn redeemed_credit_leaves_outstanding_supply(quantity in 1u64..20, redeem in 1u64..20) {
        prop_assume!(redeem <= quantity);
        let mut world = World::new();
        world.apply(&Action::Buy { holder: 0, quantity }).unwrap();
        let required_before = world.engine.required_reserve().unwrap();

        world.apply(&Action::Redeem { holder: 0, quantity: redeem }).unwrap();
        prop_assert_eq!(
            world.engine.required_reserve().unwrap(),
            required_before - redeem * 70_000
        );
    }
}
