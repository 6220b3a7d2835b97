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

//! Low-level shared types of the giftdrop runtime modules.

#![cfg_attr(not(feature = "std"), no_std)]

use codec::{Decode, Encode};
use scale_info::TypeInfo;
use sp_runtime::RuntimeDebug;
use sp_std::prelude::*;

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

/// An instant in time, as unix seconds.
pub type Moment = u64;

/// Money amount in integer cents. Monetary values are never fractional and
/// never negative; both properties are carried by the type.
pub type Balance = u128;

/// Auction ID
pub type AuctionId = u32;

/// 1-based sequential label assigned to each awarded item of an auction, in
/// the order the items are awarded across rounds.
pub type GiftNumber = u32;

/// Round counter of an auction. 0 while the auction is a draft.
pub type RoundIndex = u32;

/// Identifier distinguishing multiple independent bids of one user within
/// the same auction.
pub type EntryId = Vec<u8>;

/// Kind of a ledger entry. Amounts are always positive; the direction of
/// the movement is encoded in the kind.
#[derive(Encode, Decode, Eq, PartialEq, Copy, Clone, RuntimeDebug, TypeInfo)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub enum LedgerKind {
	/// Administrative credit to the available balance.
	Topup,
	/// Available balance locked behind a bid.
	Reserve,
	/// Reservation handed back without charge or refund semantics.
	Release,
	/// Reserved balance taken as payment for a won item.
	Charge,
	/// Reservation returned because the auction ended.
	Refund,
}

/// What a ledger entry refers to.
#[derive(Encode, Decode, Eq, PartialEq, Clone, RuntimeDebug, TypeInfo)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub enum LedgerRef {
	/// Administrative movement with no auction attached.
	Admin,
	/// Funds reserved against a bid entry.
	Bid { auction_id: AuctionId, entry_id: EntryId },
	/// Winning bid charged for an awarded gift.
	Gift {
		auction_id: AuctionId,
		gift_number: GiftNumber,
	},
	/// Remaining reservation swept back when the auction ended.
	AuctionEnd { auction_id: AuctionId, entry_id: EntryId },
}

/// Render an integer cent amount as its `units.cc` display form.
#[cfg(feature = "std")]
pub fn format_cents(amount_cents: Balance) -> String {
	format!("{}.{:02}", amount_cents / 100, amount_cents % 100)
}
