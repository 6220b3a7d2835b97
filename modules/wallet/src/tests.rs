// This file is part of Giftdrop.

// Copyright (C) 2025-2026 Giftdrop Developers.
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Unit tests for the wallet module.

#![cfg(test)]

use super::*;
use frame_support::{assert_noop, assert_ok};
use mock::*;
use sp_runtime::traits::BadOrigin;

// Recompute a wallet from its ledger alone: every movement must be audited,
// so folding the rows reproduces both halves.
fn replay_ledger(who: &AccountId) -> (Balance, Balance) {
	let mut available: Balance = 0;
	let mut reserved: Balance = 0;
	for index in 0..Wallet::ledger_count(who) {
		let entry = Wallet::ledger_entry(who, index).unwrap();
		match entry.kind {
			LedgerKind::Topup => available += entry.amount_cents,
			LedgerKind::Reserve => {
				available -= entry.amount_cents;
				reserved += entry.amount_cents;
			}
			LedgerKind::Release | LedgerKind::Refund => {
				reserved -= entry.amount_cents;
				available += entry.amount_cents;
			}
			LedgerKind::Charge => reserved -= entry.amount_cents,
		}
	}
	(available, reserved)
}

#[test]
fn register_works() {
	ExtBuilder::default().build().execute_with(|| {
		assert_ok!(Wallet::register(RuntimeOrigin::signed(ALICE), b"alice".to_vec()));
		System::assert_last_event(
			Event::UserRegistered {
				who: ALICE,
				username: b"alice".to_vec(),
			}
			.into(),
		);

		let wallet = Wallet::wallets(ALICE).unwrap();
		assert_eq!(wallet.username, b"alice".to_vec());
		assert_eq!(wallet.available_cents, 0);
		assert_eq!(wallet.reserved_cents, 0);
		assert_eq!(Wallet::username_owner(b"alice".to_vec()), Some(ALICE));
	});
}

#[test]
fn register_validates_username() {
	ExtBuilder::default().build().execute_with(|| {
		assert_noop!(
			Wallet::register(RuntimeOrigin::signed(ALICE), vec![]),
			Error::<Runtime>::InvalidUsername,
		);
		assert_noop!(
			Wallet::register(RuntimeOrigin::signed(ALICE), vec![b'a'; 33]),
			Error::<Runtime>::InvalidUsername,
		);
		assert_ok!(Wallet::register(RuntimeOrigin::signed(ALICE), vec![b'a'; 32]));
	});
}

#[test]
fn register_rejects_duplicates() {
	ExtBuilder::default().build().execute_with(|| {
		assert_ok!(Wallet::register(RuntimeOrigin::signed(ALICE), b"alice".to_vec()));
		assert_noop!(
			Wallet::register(RuntimeOrigin::signed(BOB), b"alice".to_vec()),
			Error::<Runtime>::UsernameTaken,
		);
		assert_noop!(
			Wallet::register(RuntimeOrigin::signed(ALICE), b"alice2".to_vec()),
			Error::<Runtime>::AlreadyRegistered,
		);
	});
}

#[test]
fn topup_works() {
	ExtBuilder::default().build().execute_with(|| {
		assert_ok!(Wallet::register(RuntimeOrigin::signed(ALICE), b"alice".to_vec()));
		set_now_secs(2_000);

		assert_ok!(Wallet::topup(RuntimeOrigin::signed(ADMIN), ALICE, 10_000));
		System::assert_last_event(
			Event::ToppedUp {
				who: ALICE,
				amount_cents: 10_000,
			}
			.into(),
		);

		assert_eq!(Wallet::wallets(ALICE).unwrap().available_cents, 10_000);

		let rows = Wallet::ledger(&ALICE, 10);
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].kind, LedgerKind::Topup);
		assert_eq!(rows[0].amount_cents, 10_000);
		assert_eq!(rows[0].reference, LedgerRef::Admin);
		assert_eq!(rows[0].at, 2_000);
	});
}

#[test]
fn topup_requires_update_origin() {
	ExtBuilder::default()
		.users(vec![(ALICE, b"alice".to_vec(), 0)])
		.build()
		.execute_with(|| {
			assert_noop!(Wallet::topup(RuntimeOrigin::signed(ALICE), ALICE, 100), BadOrigin);
		});
}

#[test]
fn topup_validates() {
	ExtBuilder::default()
		.users(vec![(ALICE, b"alice".to_vec(), 0)])
		.build()
		.execute_with(|| {
			assert_noop!(
				Wallet::topup(RuntimeOrigin::signed(ADMIN), ALICE, 0),
				Error::<Runtime>::AmountMustBePositive,
			);
			assert_noop!(
				Wallet::topup(RuntimeOrigin::signed(ADMIN), BOB, 100),
				Error::<Runtime>::UserNotFound,
			);
		});
}

#[test]
fn genesis_users_have_ledger_rows() {
	ExtBuilder::default()
		.users(vec![(ALICE, b"alice".to_vec(), 5_000), (BOB, b"bob".to_vec(), 0)])
		.build()
		.execute_with(|| {
			assert_eq!(Wallet::wallets(ALICE).unwrap().available_cents, 5_000);
			assert_eq!(Wallet::ledger_count(ALICE), 1);
			assert_eq!(Wallet::ledger_entry(ALICE, 0).unwrap().kind, LedgerKind::Topup);
			// a zero seed writes no audit row
			assert_eq!(Wallet::ledger_count(BOB), 0);
			assert_eq!(replay_ledger(&ALICE), (5_000, 0));
		});
}

#[test]
fn reserve_works() {
	ExtBuilder::default()
		.users(vec![(ALICE, b"alice".to_vec(), 1_000)])
		.build()
		.execute_with(|| {
			assert_ok!(Wallet::reserve(
				&ALICE,
				400,
				LedgerRef::Bid {
					auction_id: 0,
					entry_id: b"default".to_vec()
				}
			));
			System::assert_last_event(
				Event::Reserved {
					who: ALICE,
					amount_cents: 400,
				}
				.into(),
			);

			let wallet = Wallet::wallets(ALICE).unwrap();
			assert_eq!(wallet.available_cents, 600);
			assert_eq!(wallet.reserved_cents, 400);

			let rows = Wallet::ledger(&ALICE, 1);
			assert_eq!(rows[0].kind, LedgerKind::Reserve);
			assert_eq!(
				rows[0].reference,
				LedgerRef::Bid {
					auction_id: 0,
					entry_id: b"default".to_vec()
				}
			);
		});
}

#[test]
fn reserve_fails_on_insufficient_available() {
	ExtBuilder::default()
		.users(vec![(ALICE, b"alice".to_vec(), 30)])
		.build()
		.execute_with(|| {
			assert_noop!(
				Wallet::reserve(&ALICE, 40, LedgerRef::Admin),
				Error::<Runtime>::InsufficientAvailableBalance,
			);
			// nothing moved, nothing audited
			let wallet = Wallet::wallets(ALICE).unwrap();
			assert_eq!(wallet.available_cents, 30);
			assert_eq!(wallet.reserved_cents, 0);
			assert_eq!(Wallet::ledger_count(ALICE), 1);
		});
}

#[test]
fn release_works() {
	ExtBuilder::default()
		.users(vec![(ALICE, b"alice".to_vec(), 1_000)])
		.build()
		.execute_with(|| {
			assert_ok!(Wallet::reserve(&ALICE, 400, LedgerRef::Admin));
			assert_ok!(Wallet::release(&ALICE, 150, LedgerRef::Admin));

			let wallet = Wallet::wallets(ALICE).unwrap();
			assert_eq!(wallet.available_cents, 750);
			assert_eq!(wallet.reserved_cents, 250);

			assert_noop!(
				Wallet::release(&ALICE, 300, LedgerRef::Admin),
				Error::<Runtime>::InsufficientReservedBalance,
			);
		});
}

#[test]
fn charge_reserved_works() {
	ExtBuilder::default()
		.users(vec![(ALICE, b"alice".to_vec(), 1_000)])
		.build()
		.execute_with(|| {
			assert_ok!(Wallet::reserve(&ALICE, 400, LedgerRef::Admin));
			assert_ok!(Wallet::charge_reserved(
				&ALICE,
				400,
				LedgerRef::Gift {
					auction_id: 0,
					gift_number: 1
				}
			));
			System::assert_last_event(
				Event::Charged {
					who: ALICE,
					amount_cents: 400,
				}
				.into(),
			);

			// the money left the wallet entirely
			let wallet = Wallet::wallets(ALICE).unwrap();
			assert_eq!(wallet.available_cents, 600);
			assert_eq!(wallet.reserved_cents, 0);

			assert_noop!(
				Wallet::charge_reserved(&ALICE, 1, LedgerRef::Admin),
				Error::<Runtime>::InsufficientReservedBalance,
			);
		});
}

#[test]
fn refund_reserved_works() {
	ExtBuilder::default()
		.users(vec![(ALICE, b"alice".to_vec(), 1_000)])
		.build()
		.execute_with(|| {
			assert_ok!(Wallet::reserve(&ALICE, 400, LedgerRef::Admin));
			assert_ok!(Wallet::refund_reserved(
				&ALICE,
				400,
				LedgerRef::AuctionEnd {
					auction_id: 0,
					entry_id: b"default".to_vec()
				}
			));

			let wallet = Wallet::wallets(ALICE).unwrap();
			assert_eq!(wallet.available_cents, 1_000);
			assert_eq!(wallet.reserved_cents, 0);

			assert_noop!(
				Wallet::refund_reserved(&ALICE, 1, LedgerRef::Admin),
				Error::<Runtime>::InsufficientReservedBalance,
			);
		});
}

#[test]
fn wallet_ops_reject_zero_amounts() {
	ExtBuilder::default()
		.users(vec![(ALICE, b"alice".to_vec(), 1_000)])
		.build()
		.execute_with(|| {
			assert_noop!(
				Wallet::reserve(&ALICE, 0, LedgerRef::Admin),
				Error::<Runtime>::AmountMustBePositive,
			);
			assert_noop!(
				Wallet::release(&ALICE, 0, LedgerRef::Admin),
				Error::<Runtime>::AmountMustBePositive,
			);
			assert_noop!(
				Wallet::charge_reserved(&ALICE, 0, LedgerRef::Admin),
				Error::<Runtime>::AmountMustBePositive,
			);
			assert_noop!(
				Wallet::refund_reserved(&ALICE, 0, LedgerRef::Admin),
				Error::<Runtime>::AmountMustBePositive,
			);
		});
}

#[test]
fn wallet_ops_require_registration() {
	ExtBuilder::default().build().execute_with(|| {
		assert!(!Wallet::is_registered(&ALICE));
		assert_eq!(Wallet::available_cents(&ALICE), 0);
		assert_noop!(
			Wallet::reserve(&ALICE, 10, LedgerRef::Admin),
			Error::<Runtime>::UserNotFound,
		);
	});
}

#[test]
fn ledger_reads_newest_first() {
	ExtBuilder::default()
		.users(vec![(ALICE, b"alice".to_vec(), 1_000)])
		.build()
		.execute_with(|| {
			assert_ok!(Wallet::reserve(&ALICE, 100, LedgerRef::Admin));
			assert_ok!(Wallet::reserve(&ALICE, 200, LedgerRef::Admin));
			assert_ok!(Wallet::release(&ALICE, 50, LedgerRef::Admin));

			let rows = Wallet::ledger(&ALICE, 10);
			assert_eq!(rows.len(), 4);
			assert_eq!(rows[0].kind, LedgerKind::Release);
			assert_eq!(rows[1].kind, LedgerKind::Reserve);
			assert_eq!(rows[1].amount_cents, 200);
			assert_eq!(rows[3].kind, LedgerKind::Topup);

			let limited = Wallet::ledger(&ALICE, 2);
			assert_eq!(limited.len(), 2);
			assert_eq!(limited[0].kind, LedgerKind::Release);
		});
}

#[test]
fn ledger_replay_reproduces_wallet() {
	ExtBuilder::default()
		.users(vec![(ALICE, b"alice".to_vec(), 10_000)])
		.build()
		.execute_with(|| {
			assert_ok!(Wallet::topup(RuntimeOrigin::signed(ADMIN), ALICE, 2_500));
			assert_ok!(Wallet::reserve(&ALICE, 4_000, LedgerRef::Admin));
			assert_ok!(Wallet::release(&ALICE, 500, LedgerRef::Admin));
			assert_ok!(Wallet::charge_reserved(&ALICE, 1_000, LedgerRef::Admin));
			assert_ok!(Wallet::refund_reserved(&ALICE, 1_500, LedgerRef::Admin));

			let wallet = Wallet::wallets(ALICE).unwrap();
			assert_eq!(replay_ledger(&ALICE), (wallet.available_cents, wallet.reserved_cents));
			assert_eq!(wallet.available_cents, 10_500);
			assert_eq!(wallet.reserved_cents, 1_000);
		});
}

#[test]
fn wallet_snapshots_works() {
	ExtBuilder::default()
		.users(vec![(ALICE, b"alice".to_vec(), 100), (BOB, b"bob".to_vec(), 200)])
		.build()
		.execute_with(|| {
			assert_ok!(Wallet::reserve(&BOB, 50, LedgerRef::Admin));

			let mut snapshots = Wallet::wallet_snapshots();
			snapshots.sort();
			assert_eq!(snapshots, vec![(ALICE, 100, 0), (BOB, 150, 50)]);
		});
}
