//! Withheld fee collection over deployed mints

use solana_sdk::{pubkey::Pubkey, rent::Rent};

use super::test_helpers::{Harness, PAYER_FUNDS};
use crate::fees::{collect_withheld_fees, scan_withheld, CollectionOutcome};
use crate::test_utils::{token_account_data, token_owned, MockWallet};
use crate::tx_builder::associated_account;

/// Deploy a mint and give it holders withholding `withheld` each
async fn deployed_with_holders(
    harness: &Harness,
    withheld: &[u64],
) -> (Pubkey, Pubkey, Vec<Pubkey>) {
    let report = harness.deploy("FEE").await.unwrap();
    let holders = withheld
        .iter()
        .map(|&amount| {
            let address = Pubkey::new_unique();
            let data = token_account_data(report.mint, Pubkey::new_unique(), 500, amount);
            let lamports = Rent::default().minimum_balance(data.len());
            harness.chain.set_account(address, token_owned(data, lamports));
            address
        })
        .collect();
    (report.mint, report.associated_account, holders)
}

#[tokio::test]
async fn test_withdraws_only_nonzero_accounts() {
    let harness = Harness::new();
    let (mint, destination, holders) = deployed_with_holders(&harness, &[0, 5, 0, 12]).await;

    // Belongs to another mint and must be left alone
    let stranger = Pubkey::new_unique();
    let data = token_account_data(Pubkey::new_unique(), Pubkey::new_unique(), 1, 99);
    harness.chain.set_account(stranger, token_owned(data, 1));

    let reports = collect_withheld_fees(harness.chain.as_ref(), &harness.wallet, &[mint], 9).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].mint, mint);

    let CollectionOutcome::Withdrawn {
        accounts,
        total_withheld,
        ui_total,
        ..
    } = &reports[0].outcome
    else {
        panic!("expected a withdrawal, got {:?}", reports[0].outcome);
    };
    assert_eq!(accounts.len(), 2);
    assert!(accounts.contains(&holders[1]));
    assert!(accounts.contains(&holders[3]));
    assert_eq!(*total_withheld, 17);
    assert!((ui_total - 0.000000017).abs() < 1e-15);

    assert_eq!(
        harness.chain.token_amount(&destination),
        Some(10_000_000_000 + 17)
    );
    for holder in &holders {
        assert_eq!(harness.chain.withheld_amount(holder), Some(0));
    }
    assert_eq!(harness.chain.withheld_amount(&stranger), Some(99));
}

#[tokio::test]
async fn test_second_run_has_nothing_to_withdraw() {
    let harness = Harness::new();
    let (mint, _, _) = deployed_with_holders(&harness, &[3]).await;

    let first = collect_withheld_fees(harness.chain.as_ref(), &harness.wallet, &[mint], 9).await;
    assert!(matches!(first[0].outcome, CollectionOutcome::Withdrawn { .. }));
    let sent_before = harness.chain.sent_transactions().len();

    let second = collect_withheld_fees(harness.chain.as_ref(), &harness.wallet, &[mint], 9).await;
    assert_eq!(second[0].outcome, CollectionOutcome::NothingToWithdraw);
    // Destination already exists, so nothing is submitted at all
    assert_eq!(harness.chain.sent_transactions().len(), sent_before);
}

#[tokio::test]
async fn test_failing_mint_does_not_stop_the_next() {
    let harness = Harness::new();
    let (mint, _, _) = deployed_with_holders(&harness, &[4]).await;
    let unknown = Pubkey::new_unique();

    let reports = collect_withheld_fees(
        harness.chain.as_ref(),
        &harness.wallet,
        &[unknown, mint],
        9,
    )
    .await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].mint, unknown);
    assert!(matches!(reports[0].outcome, CollectionOutcome::Failed { .. }));
    assert_eq!(reports[1].mint, mint);
    assert!(matches!(
        reports[1].outcome,
        CollectionOutcome::Withdrawn { total_withheld: 4, .. }
    ));
}

#[tokio::test]
async fn test_destination_is_created_even_without_withdraw_authority() {
    let harness = Harness::new();
    let (mint, _, _) = deployed_with_holders(&harness, &[7]).await;

    let outsider = MockWallet::connected();
    harness.chain.fund(outsider.pubkey(), PAYER_FUNDS);
    let destination = associated_account(&outsider.pubkey(), &mint);
    assert!(harness.chain.account(&destination).is_none());

    let reports = collect_withheld_fees(harness.chain.as_ref(), &outsider, &[mint], 9).await;

    assert!(matches!(reports[0].outcome, CollectionOutcome::Failed { .. }));
    assert_eq!(harness.chain.token_amount(&destination), Some(0));
    // Fees stay where they were
    let scan = scan_withheld(harness.chain.as_ref(), &mint).await.unwrap();
    assert_eq!(scan.total_withheld, 7);
}
