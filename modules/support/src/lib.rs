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

//! Traits shared across the giftdrop runtime modules.

#![cfg_attr(not(feature = "std"), no_std)]

use primitives::{Balance, LedgerRef};
use sp_runtime::DispatchResult;
use sp_std::vec::Vec;

/// The user wallet as seen by the auction engine.
///
/// Every mutating operation moves money between the available and the
/// reserved half of one wallet and appends exactly one ledger row carrying
/// `reference`. An operation either commits in full or fails without
/// touching the wallet.
pub trait WalletManager<AccountId> {
	fn is_registered(who: &AccountId) -> bool;

	fn available_cents(who: &AccountId) -> Balance;

	fn reserved_cents(who: &AccountId) -> Balance;

	/// Lock `amount_cents` of available balance behind a bid.
	fn reserve(who: &AccountId, amount_cents: Balance, reference: LedgerRef) -> DispatchResult;

	/// Hand `amount_cents` of reserved balance back to available.
	fn release(who: &AccountId, amount_cents: Balance, reference: LedgerRef) -> DispatchResult;

	/// Take `amount_cents` out of the reserved balance as payment.
	fn charge_reserved(who: &AccountId, amount_cents: Balance, reference: LedgerRef) -> DispatchResult;

	/// Return `amount_cents` of reserved balance to available as a refund.
	fn refund_reserved(who: &AccountId, amount_cents: Balance, reference: LedgerRef) -> DispatchResult;

	/// `(account, available_cents, reserved_cents)` of every wallet, for
	/// read-only audits.
	fn wallet_snapshots() -> Vec<(AccountId, Balance, Balance)>;
}
