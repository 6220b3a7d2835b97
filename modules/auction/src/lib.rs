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

//! # Gift Auction Module
//!
//! ## Overview
//!
//! Runs multi-round sealed auctions over a limited pool of identical
//! digital items. Bidders repeatedly raise their offers; money backing a
//! bid is reserved in the bidder's wallet the moment the bid lands. When a
//! round is due, the settlement engine converts the top bids into wins
//! (each labelled with a sequential gift number), charges the winners from
//! their reservations and either opens the next round or, once the item
//! pool is exhausted, refunds every remaining active bid and ends the
//! auction.
//!
//! Settlement is driven by the offchain worker: it scans for due rounds
//! and submits unsigned `settle_round` transactions. A per-auction lease
//! with a fencing token keeps a round under exactly one settler; leases
//! abandoned for longer than [`STALE_LEASE_SECS`] are force-released by
//! the same scan.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::unused_unit)]

use frame_support::{pallet_prelude::*, traits::UnixTime, transactional};
use frame_system::{
	offchain::{SendTransactionTypes, SubmitTransaction},
	pallet_prelude::*,
};
use primitives::{AuctionId, Balance, EntryId, GiftNumber, LedgerRef, Moment, RoundIndex};
use sp_runtime::{
	offchain::{
		storage::StorageValueRef,
		storage_lock::{StorageLock, Time},
		Duration,
	},
	traits::Zero,
	transaction_validity::{
		InvalidTransaction, TransactionPriority, TransactionSource, TransactionValidity, ValidTransaction,
	},
	DispatchResult, RuntimeDebug,
};
use sp_std::{collections::btree_map::BTreeMap, prelude::*};
use support::WalletManager;

mod mock;
pub mod weights;

pub use module::*;
pub use weights::WeightInfo;

pub const OFFCHAIN_WORKER_DATA: &[u8] = b"giftdrop/auction/data/";
pub const OFFCHAIN_WORKER_LOCK: &[u8] = b"giftdrop/auction/lock/";
pub const OFFCHAIN_WORKER_MAX_ITERATIONS: &[u8] = b"giftdrop/auction/max-iterations/";
pub const LOCK_DURATION: u64 = 100;
pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;

/// A settlement lease older than this is considered abandoned and may be
/// force-released by the scheduler scan.
pub const STALE_LEASE_SECS: u64 = 120;

/// Entry identifier used when a bidder does not name one.
pub const DEFAULT_ENTRY_ID: &[u8] = b"default";
pub const MAX_ENTRY_ID_LEN: usize = 64;
pub const MAX_TITLE_LEN: usize = 128;

pub const MAX_TOTAL_ITEMS: u32 = 1_000_000;
pub const MAX_ITEMS_PER_ROUND: u32 = 100_000;
pub const MIN_ROUND_DURATION_SECS: u64 = 10;
pub const MAX_ROUND_DURATION_SECS: u64 = 3_600;
pub const MAX_ANTI_SNIPE_WINDOW_SECS: u64 = 3_600;
pub const MAX_ANTI_SNIPE_EXTENSION_SECS: u64 = 600;
pub const MAX_ANTI_SNIPE_TOTAL_EXTENSION_SECS: u64 = 3_600;

/// Anti-sniping policy of an auction. A bid landing within `window_secs`
/// of the round end pushes the end out by `extension_secs`, up to
/// `max_total_extension_secs` per round. A zero cap means unlimited.
#[derive(Encode, Decode, Clone, Copy, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct AntiSnipeConfig {
	pub window_secs: u64,
	pub extension_secs: u64,
	pub max_total_extension_secs: u64,
}

impl AntiSnipeConfig {
	fn is_enabled(&self) -> bool {
		self.window_secs > 0 && self.extension_secs > 0
	}

	/// Seconds to extend the round for a bid at `now`, given the current
	/// end instant and how much the round was already extended.
	fn extension_for(&self, now: Moment, round_ends_at: Moment, extended_secs: u64) -> u64 {
		if !self.is_enabled() || now < round_ends_at.saturating_sub(self.window_secs) {
			return 0;
		}
		if self.max_total_extension_secs == 0 {
			self.extension_secs
		} else {
			self.extension_secs
				.min(self.max_total_extension_secs.saturating_sub(extended_secs))
		}
	}
}

#[derive(Encode, Decode, Clone, Copy, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub enum AuctionStatus {
	Draft,
	Running,
	Ended,
}

/// Exclusive claim of one settlement worker on an auction round.
#[derive(Encode, Decode, Clone, Copy, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct SettlementLease {
	/// Fencing token, unique per acquisition.
	pub lock_id: u64,
	/// When the lease was taken, unix seconds.
	pub taken_at: Moment,
}

impl SettlementLease {
	fn is_stale(&self, now: Moment) -> bool {
		self.taken_at.saturating_add(STALE_LEASE_SECS) <= now
	}
}

/// Information of one auction.
#[derive(Encode, Decode, Clone, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct AuctionInfo {
	pub title: Vec<u8>,
	pub min_bid_cents: Balance,
	pub total_items: u32,
	pub items_per_round: u32,
	pub round_duration_secs: u64,
	pub anti_snipe: AntiSnipeConfig,
	pub status: AuctionStatus,
	/// 0 while the auction is a draft, frozen at the terminal round once
	/// ended.
	pub current_round: RoundIndex,
	pub round_started_at: Option<Moment>,
	pub round_ends_at: Option<Moment>,
	/// Anti-snipe budget already consumed in the current round.
	pub round_extended_secs: u64,
	pub remaining_items: u32,
	pub next_gift_number: GiftNumber,
	pub lease: Option<SettlementLease>,
}

impl AuctionInfo {
	fn is_running(&self) -> bool {
		matches!(self.status, AuctionStatus::Running)
	}

	/// The current round is over and waiting for settlement at `now`.
	fn is_due(&self, now: Moment) -> bool {
		self.is_running() && self.round_ends_at.map_or(false, |ends_at| ends_at <= now)
	}
}

/// One bid row. `(auction, bidder, entry)` identify it uniquely; the
/// amount only ever increases while the row is active.
#[derive(Encode, Decode, Clone, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct BidInfo {
	pub amount_cents: Balance,
	pub active: bool,
	/// Unix seconds of the latest raise.
	pub last_bid_at: Moment,
	/// Global placement sequence stamped on the latest raise. Orders equal
	/// amounts by commit order during winner selection.
	pub seq: u64,
}

/// Snapshot taken when a bid wins a gift. Never updated.
#[derive(Encode, Decode, Clone, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct WinnerInfo<AccountId> {
	pub round: RoundIndex,
	pub who: AccountId,
	pub entry_id: EntryId,
	pub amount_cents: Balance,
}

/// Result of the read-only money audit: per wallet, the reserved balance
/// must equal the sum of its active bids on non-ended auctions.
#[derive(RuntimeDebug, PartialEq, Eq)]
pub struct InvariantReport<AccountId> {
	pub ok: bool,
	pub sum_active_bid_cents: Balance,
	pub sum_reserved_cents: Balance,
	/// `(account, reserved_cents, active_bid_cents)` of every wallet where
	/// the two sides disagree.
	pub mismatches: Vec<(AccountId, Balance, Balance)>,
}

#[derive(RuntimeDebug)]
enum OffchainErr {
	NotValidator,
	OffchainLock,
}

#[frame_support::pallet]
pub mod module {
	use super::*;

	#[pallet::config]
	pub trait Config: frame_system::Config + SendTransactionTypes<Call<Self>> {
		type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

		/// Wallet backing the bids: reservation, charging and refunds.
		type Wallet: WalletManager<Self::AccountId>;

		/// Wall-clock source for round timing.
		type UnixTime: UnixTime;

		/// The origin which may create and start auctions.
		type CreateOrigin: EnsureOrigin<Self::RuntimeOrigin>;

		#[pallet::constant]
		/// A configuration for base priority of unsigned transactions.
		///
		/// This is exposed so that it can be tuned for particular runtime,
		/// when multiple modules send unsigned transactions.
		type UnsignedPriority: Get<TransactionPriority>;

		/// Weight information for the extrinsics in this module.
		type WeightInfo: WeightInfo;
	}

	#[pallet::error]
	pub enum Error<T> {
		/// The auction does not exist.
		AuctionNotFound,
		/// No wallet exists for the bidder.
		UserNotFound,
		/// Only draft auctions can be started.
		AuctionNotDraft,
		/// Bids are only accepted while the auction is running.
		AuctionNotRunning,
		/// The item pool is exhausted.
		AuctionEnded,
		/// The current round is already over.
		AuctionRoundEnded,
		/// The auction runs without a round end instant. Status/timer skew;
		/// should be unreachable.
		AuctionRoundNotSet,
		/// A settlement worker holds the auction. Transient; retry after
		/// the round boundary.
		AuctionIsSettling,
		/// The bid is below the auction minimum.
		BidBelowMin,
		/// A raise must strictly exceed the previous bid of the entry.
		BidMustIncrease,
		/// Title length is out of bounds.
		InvalidTitle,
		/// Entry id length is out of bounds.
		InvalidEntryId,
		/// The minimum bid must be at least one cent.
		MinBidMustBePositive,
		TotalItemsMustBePositive,
		TotalItemsTooMany,
		ItemsPerRoundMustBePositive,
		ItemsPerRoundTooMany,
		/// More items per round than the auction has in total.
		ItemsPerRoundGtTotal,
		RoundDurationTooSmall,
		RoundDurationTooLarge,
		AntiSnipeWindowTooLarge,
		AntiSnipeExtensionTooLarge,
		AntiSnipeMaxExtensionTooLarge,
		/// A winner's reserved balance cannot cover its own winning bid.
		/// Data integrity fault; settlement aborts and alerts the operator.
		ReservedBelowWinningBid,
		/// The auction holds no settlement lease.
		NotSettling,
		/// The settlement lease is still within its validity window.
		LeaseNotExpired,
	}

	#[pallet::event]
	#[pallet::generate_deposit(pub(crate) fn deposit_event)]
	pub enum Event<T: Config> {
		/// A new auction was created in draft state.
		AuctionCreated {
			auction_id: AuctionId,
			total_items: u32,
			items_per_round: u32,
		},
		/// The auction opened its first round.
		AuctionStarted {
			auction_id: AuctionId,
			round_ends_at: Moment,
		},
		/// A bid was placed or raised.
		BidPlaced {
			auction_id: AuctionId,
			who: T::AccountId,
			entry_id: EntryId,
			amount_cents: Balance,
		},
		/// A late bid extended the current round.
		RoundExtended {
			auction_id: AuctionId,
			round: RoundIndex,
			round_ends_at: Moment,
			added_secs: u64,
		},
		/// A bid won an item.
		GiftAwarded {
			auction_id: AuctionId,
			round: RoundIndex,
			gift_number: GiftNumber,
			who: T::AccountId,
			amount_cents: Balance,
		},
		/// A round was settled and the next one opened.
		RoundSettled {
			auction_id: AuctionId,
			round: RoundIndex,
			winners: u32,
			remaining_items: u32,
		},
		/// An active bid was refunded because the auction ended.
		BidRefunded {
			auction_id: AuctionId,
			who: T::AccountId,
			entry_id: EntryId,
			amount_cents: Balance,
		},
		/// The item pool is exhausted and the auction is over.
		AuctionEnded {
			auction_id: AuctionId,
			refunded_bids: u32,
		},
		/// An abandoned settlement lease was force-released.
		SettlementLeaseReleased { auction_id: AuctionId, lock_id: u64 },
	}

	/// Monotonic id source for new auctions.
	#[pallet::storage]
	#[pallet::getter(fn next_auction_id)]
	pub type NextAuctionId<T: Config> = StorageValue<_, AuctionId, ValueQuery>;

	/// All auctions, drafts and ended ones included.
	///
	/// Auctions: map AuctionId => Option<AuctionInfo>
	#[pallet::storage]
	#[pallet::getter(fn auctions)]
	pub type Auctions<T: Config> = StorageMap<_, Twox64Concat, AuctionId, AuctionInfo, OptionQuery>;

	/// One row per `(auction, bidder, entry)`. Rows survive settlement
	/// inactive, as history.
	///
	/// Bids: double map AuctionId, (AccountId, EntryId) => Option<BidInfo>
	#[pallet::storage]
	#[pallet::getter(fn bids)]
	pub type Bids<T: Config> = StorageDoubleMap<
		_,
		Twox64Concat,
		AuctionId,
		Blake2_128Concat,
		(T::AccountId, EntryId),
		BidInfo,
		OptionQuery,
	>;

	/// Winner snapshot per awarded gift number.
	///
	/// Winners: double map AuctionId, GiftNumber => Option<WinnerInfo>
	#[pallet::storage]
	#[pallet::getter(fn winners)]
	pub type Winners<T: Config> =
		StorageDoubleMap<_, Twox64Concat, AuctionId, Twox64Concat, GiftNumber, WinnerInfo<T::AccountId>, OptionQuery>;

	/// Global bid placement counter; the tiebreaker for equal amounts.
	#[pallet::storage]
	#[pallet::getter(fn next_bid_seq)]
	pub type NextBidSeq<T: Config> = StorageValue<_, u64, ValueQuery>;

	/// Fencing token source for settlement leases.
	#[pallet::storage]
	#[pallet::getter(fn next_lock_id)]
	pub type NextLockId<T: Config> = StorageValue<_, u64, ValueQuery>;

	#[pallet::pallet]
	#[pallet::without_storage_info]
	pub struct Pallet<T>(_);

	#[pallet::hooks]
	impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
		/// Start offchain worker to find due rounds and abandoned leases
		/// and submit the matching unsigned transactions.
		fn offchain_worker(now: BlockNumberFor<T>) {
			if let Err(e) = Self::_offchain_worker() {
				log::info!(
					target: "gift-auction offchain worker",
					"cannot run offchain worker at {:?}: {:?}",
					now,
					e,
				);
			} else {
				log::debug!(
					target: "gift-auction offchain worker",
					"offchain worker start at block: {:?} already done!",
					now,
				);
			}
		}
	}

	#[pallet::call]
	impl<T: Config> Pallet<T> {
		/// Create a new auction in draft state.
		///
		/// The dispatch origin of this call must be `CreateOrigin`.
		#[pallet::call_index(0)]
		#[pallet::weight(<T as Config>::WeightInfo::create_auction())]
		#[transactional]
		pub fn create_auction(
			origin: OriginFor<T>,
			title: Vec<u8>,
			total_items: u32,
			items_per_round: u32,
			round_duration_secs: u64,
			#[pallet::compact] min_bid_cents: Balance,
			anti_snipe_window_secs: u64,
			anti_snipe_extension_secs: u64,
			anti_snipe_max_total_extension_secs: u64,
		) -> DispatchResult {
			T::CreateOrigin::ensure_origin(origin)?;
			ensure!((1..=MAX_TITLE_LEN).contains(&title.len()), Error::<T>::InvalidTitle);
			ensure!(!total_items.is_zero(), Error::<T>::TotalItemsMustBePositive);
			ensure!(total_items <= MAX_TOTAL_ITEMS, Error::<T>::TotalItemsTooMany);
			ensure!(!items_per_round.is_zero(), Error::<T>::ItemsPerRoundMustBePositive);
			ensure!(items_per_round <= MAX_ITEMS_PER_ROUND, Error::<T>::ItemsPerRoundTooMany);
			ensure!(items_per_round <= total_items, Error::<T>::ItemsPerRoundGtTotal);
			ensure!(
				round_duration_secs >= MIN_ROUND_DURATION_SECS,
				Error::<T>::RoundDurationTooSmall
			);
			ensure!(
				round_duration_secs <= MAX_ROUND_DURATION_SECS,
				Error::<T>::RoundDurationTooLarge
			);
			ensure!(!min_bid_cents.is_zero(), Error::<T>::MinBidMustBePositive);
			ensure!(
				anti_snipe_window_secs <= MAX_ANTI_SNIPE_WINDOW_SECS,
				Error::<T>::AntiSnipeWindowTooLarge
			);
			ensure!(
				anti_snipe_extension_secs <= MAX_ANTI_SNIPE_EXTENSION_SECS,
				Error::<T>::AntiSnipeExtensionTooLarge
			);
			ensure!(
				anti_snipe_max_total_extension_secs <= MAX_ANTI_SNIPE_TOTAL_EXTENSION_SECS,
				Error::<T>::AntiSnipeMaxExtensionTooLarge
			);

			let auction_id = NextAuctionId::<T>::mutate(|id| {
				let current = *id;
				*id = id.saturating_add(1);
				current
			});
			Auctions::<T>::insert(
				auction_id,
				AuctionInfo {
					title,
					min_bid_cents,
					total_items,
					items_per_round,
					round_duration_secs,
					anti_snipe: AntiSnipeConfig {
						window_secs: anti_snipe_window_secs,
						extension_secs: anti_snipe_extension_secs,
						max_total_extension_secs: anti_snipe_max_total_extension_secs,
					},
					status: AuctionStatus::Draft,
					current_round: 0,
					round_started_at: None,
					round_ends_at: None,
					round_extended_secs: 0,
					remaining_items: total_items,
					next_gift_number: 1,
					lease: None,
				},
			);

			Self::deposit_event(Event::AuctionCreated {
				auction_id,
				total_items,
				items_per_round,
			});
			Ok(())
		}

		/// Open the first round of a draft auction.
		///
		/// The dispatch origin of this call must be `CreateOrigin`.
		#[pallet::call_index(1)]
		#[pallet::weight(<T as Config>::WeightInfo::start_auction())]
		#[transactional]
		pub fn start_auction(origin: OriginFor<T>, auction_id: AuctionId) -> DispatchResult {
			T::CreateOrigin::ensure_origin(origin)?;

			let now = Self::now_secs();
			let round_ends_at = Auctions::<T>::try_mutate(auction_id, |maybe_auction| -> Result<Moment, DispatchError> {
				let auction = maybe_auction.as_mut().ok_or(Error::<T>::AuctionNotFound)?;
				ensure!(
					matches!(auction.status, AuctionStatus::Draft),
					Error::<T>::AuctionNotDraft
				);

				let ends_at = now.saturating_add(auction.round_duration_secs);
				auction.status = AuctionStatus::Running;
				auction.current_round = 1;
				auction.round_started_at = Some(now);
				auction.round_ends_at = Some(ends_at);
				Ok(ends_at)
			})?;

			Self::deposit_event(Event::AuctionStarted {
				auction_id,
				round_ends_at,
			});
			Ok(())
		}

		/// Place a new bid or raise an existing one.
		///
		/// The caller's wallet reserves the difference to the previous bid
		/// of the same entry; the reservation, the bid row, its audit row
		/// and a possible anti-snipe extension commit together or not at
		/// all.
		#[pallet::call_index(2)]
		#[pallet::weight(<T as Config>::WeightInfo::place_bid())]
		#[transactional]
		pub fn place_bid(
			origin: OriginFor<T>,
			auction_id: AuctionId,
			#[pallet::compact] amount_cents: Balance,
			entry_id: Option<EntryId>,
		) -> DispatchResult {
			let who = ensure_signed(origin)?;
			let entry_id = entry_id.unwrap_or_else(|| DEFAULT_ENTRY_ID.to_vec());
			ensure!(
				(1..=MAX_ENTRY_ID_LEN).contains(&entry_id.len()),
				Error::<T>::InvalidEntryId
			);

			let now = Self::now_secs();
			Auctions::<T>::try_mutate(auction_id, |maybe_auction| -> DispatchResult {
				let auction = maybe_auction.as_mut().ok_or(Error::<T>::AuctionNotFound)?;
				ensure!(T::Wallet::is_registered(&who), Error::<T>::UserNotFound);
				ensure!(auction.is_running(), Error::<T>::AuctionNotRunning);
				ensure!(!auction.remaining_items.is_zero(), Error::<T>::AuctionEnded);
				ensure!(auction.lease.is_none(), Error::<T>::AuctionIsSettling);
				let round_ends_at = auction.round_ends_at.ok_or(Error::<T>::AuctionRoundNotSet)?;
				ensure!(round_ends_at > now, Error::<T>::AuctionRoundEnded);
				ensure!(amount_cents >= auction.min_bid_cents, Error::<T>::BidBelowMin);

				let prev_cents = Bids::<T>::get(auction_id, (&who, &entry_id)).map_or(0, |bid| bid.amount_cents);
				ensure!(amount_cents > prev_cents, Error::<T>::BidMustIncrease);
				let delta_cents = amount_cents - prev_cents;

				T::Wallet::reserve(
					&who,
					delta_cents,
					LedgerRef::Bid {
						auction_id,
						entry_id: entry_id.clone(),
					},
				)?;

				let seq = NextBidSeq::<T>::mutate(|seq| {
					*seq = seq.saturating_add(1);
					*seq
				});
				Bids::<T>::insert(
					auction_id,
					(&who, &entry_id),
					BidInfo {
						amount_cents,
						active: true,
						last_bid_at: now,
						seq,
					},
				);

				// evaluated against the end instant left behind by earlier
				// bids of this round, so extensions compose in commit order
				let added_secs = auction
					.anti_snipe
					.extension_for(now, round_ends_at, auction.round_extended_secs);
				if added_secs > 0 {
					let extended_ends_at = round_ends_at.saturating_add(added_secs);
					auction.round_ends_at = Some(extended_ends_at);
					auction.round_extended_secs = auction.round_extended_secs.saturating_add(added_secs);
					Self::deposit_event(Event::RoundExtended {
						auction_id,
						round: auction.current_round,
						round_ends_at: extended_ends_at,
						added_secs,
					});
				}

				Self::deposit_event(Event::BidPlaced {
					auction_id,
					who: who.clone(),
					entry_id: entry_id.clone(),
					amount_cents,
				});
				Ok(())
			})
		}

		/// Settle the due round of an auction.
		///
		/// The dispatch origin of this call must be _None_. Submitted by
		/// the offchain worker; losing the settlement race is not an
		/// error.
		#[pallet::call_index(3)]
		#[pallet::weight(<T as Config>::WeightInfo::settle_round())]
		#[transactional]
		pub fn settle_round(origin: OriginFor<T>, auction_id: AuctionId) -> DispatchResult {
			ensure_none(origin)?;
			Self::do_settle_round(auction_id, Self::now_secs())
		}

		/// Force-release a settlement lease abandoned for longer than
		/// [`STALE_LEASE_SECS`].
		///
		/// The dispatch origin of this call must be _None_.
		#[pallet::call_index(4)]
		#[pallet::weight(<T as Config>::WeightInfo::release_stale_lease())]
		#[transactional]
		pub fn release_stale_lease(origin: OriginFor<T>, auction_id: AuctionId) -> DispatchResult {
			ensure_none(origin)?;

			let now = Self::now_secs();
			Auctions::<T>::try_mutate(auction_id, |maybe_auction| -> DispatchResult {
				let auction = maybe_auction.as_mut().ok_or(Error::<T>::AuctionNotFound)?;
				let lease = auction.lease.ok_or(Error::<T>::NotSettling)?;
				ensure!(lease.is_stale(now), Error::<T>::LeaseNotExpired);

				auction.lease = None;
				Self::deposit_event(Event::SettlementLeaseReleased {
					auction_id,
					lock_id: lease.lock_id,
				});
				Ok(())
			})
		}
	}

	#[pallet::validate_unsigned]
	impl<T: Config> ValidateUnsigned for Pallet<T> {
		type Call = Call<T>;

		fn validate_unsigned(_source: TransactionSource, call: &Self::Call) -> TransactionValidity {
			match call {
				Call::settle_round { auction_id } => {
					let now = Self::now_secs();
					match Auctions::<T>::get(auction_id) {
						Some(auction) if auction.is_due(now) && auction.lease.is_none() => {
							ValidTransaction::with_tag_prefix("GiftAuctionOffchainWorker")
								.priority(T::UnsignedPriority::get())
								.and_provides((<frame_system::Pallet<T>>::block_number(), auction_id))
								.longevity(64_u64)
								.propagate(true)
								.build()
						}
						_ => InvalidTransaction::Stale.into(),
					}
				}
				Call::release_stale_lease { auction_id } => {
					let lease = Auctions::<T>::get(auction_id).and_then(|auction| auction.lease);
					match lease {
						Some(lease) if lease.is_stale(Self::now_secs()) => {
							ValidTransaction::with_tag_prefix("GiftAuctionOffchainWorker")
								.priority(T::UnsignedPriority::get())
								.and_provides((auction_id, lease.lock_id))
								.longevity(64_u64)
								.propagate(true)
								.build()
						}
						_ => InvalidTransaction::Stale.into(),
					}
				}
				_ => InvalidTransaction::Call.into(),
			}
		}
	}
}

impl<T: Config> Pallet<T> {
	fn now_secs() -> Moment {
		T::UnixTime::now().as_secs()
	}

	/// Close the due round of `auction_id` at `now`: award the top bids,
	/// charge the winners, then either open the next round or refund every
	/// remaining active bid and end the auction.
	///
	/// Returns without effect when the round is not due or another worker
	/// holds the lease.
	fn do_settle_round(auction_id: AuctionId, now: Moment) -> DispatchResult {
		let mut auction = match Auctions::<T>::get(auction_id) {
			Some(auction) => auction,
			None => return Ok(()),
		};
		if !auction.is_due(now) || auction.lease.is_some() {
			log::debug!(
				target: "gift-auction",
				"skip settlement of auction {:?}: not due or already leased",
				auction_id,
			);
			return Ok(());
		}

		let lock_id = NextLockId::<T>::mutate(|id| {
			*id = id.saturating_add(1);
			*id
		});
		auction.lease = Some(SettlementLease { lock_id, taken_at: now });

		let round = auction.current_round;
		let capacity = auction.items_per_round.min(auction.remaining_items);

		// active bids, strongest first: amount descending, then placement
		// order
		let mut candidates: Vec<((T::AccountId, EntryId), BidInfo)> = Bids::<T>::iter_prefix(auction_id)
			.filter(|(_, bid)| bid.active)
			.collect();
		candidates.sort_by(|(_, a), (_, b)| b.amount_cents.cmp(&a.amount_cents).then(a.seq.cmp(&b.seq)));
		candidates.truncate(capacity as usize);

		let winners_count = candidates.len() as u32;
		for (i, ((who, entry_id), bid)) in candidates.into_iter().enumerate() {
			let gift_number = auction.next_gift_number.saturating_add(i as u32);
			Winners::<T>::insert(
				auction_id,
				gift_number,
				WinnerInfo {
					round,
					who: who.clone(),
					entry_id: entry_id.clone(),
					amount_cents: bid.amount_cents,
				},
			);
			T::Wallet::charge_reserved(
				&who,
				bid.amount_cents,
				LedgerRef::Gift {
					auction_id,
					gift_number,
				},
			)
			.map_err(|err| {
				log::error!(
					target: "gift-auction",
					"settlement of auction {:?} aborted: reserved balance of {:?} cannot cover winning bid {:?}: {:?}",
					auction_id, who, bid.amount_cents, err,
				);
				Error::<T>::ReservedBelowWinningBid
			})?;
			Bids::<T>::mutate(auction_id, (&who, &entry_id), |maybe_bid| {
				if let Some(bid) = maybe_bid {
					bid.active = false;
				}
			});
			Self::deposit_event(Event::GiftAwarded {
				auction_id,
				round,
				gift_number,
				who,
				amount_cents: bid.amount_cents,
			});
		}

		auction.remaining_items -= winners_count;
		auction.next_gift_number = auction.next_gift_number.saturating_add(winners_count);

		if auction.remaining_items.is_zero() {
			// pool exhausted: sweep every reservation back, losers of this
			// round and entries that never won alike
			let leftovers: Vec<((T::AccountId, EntryId), BidInfo)> = Bids::<T>::iter_prefix(auction_id)
				.filter(|(_, bid)| bid.active)
				.collect();
			let refunded_bids = leftovers.len() as u32;
			for ((who, entry_id), bid) in leftovers {
				T::Wallet::refund_reserved(
					&who,
					bid.amount_cents,
					LedgerRef::AuctionEnd {
						auction_id,
						entry_id: entry_id.clone(),
					},
				)?;
				Bids::<T>::mutate(auction_id, (&who, &entry_id), |maybe_bid| {
					if let Some(bid) = maybe_bid {
						bid.active = false;
					}
				});
				Self::deposit_event(Event::BidRefunded {
					auction_id,
					who,
					entry_id,
					amount_cents: bid.amount_cents,
				});
			}

			auction.status = AuctionStatus::Ended;
			auction.round_started_at = None;
			auction.round_ends_at = None;
			auction.round_extended_secs = 0;
			auction.lease = None;
			Auctions::<T>::insert(auction_id, auction);

			Self::deposit_event(Event::AuctionEnded {
				auction_id,
				refunded_bids,
			});
		} else {
			auction.current_round = auction.current_round.saturating_add(1);
			auction.round_started_at = Some(now);
			auction.round_ends_at = Some(now.saturating_add(auction.round_duration_secs));
			auction.round_extended_secs = 0;
			auction.lease = None;
			let remaining_items = auction.remaining_items;
			Auctions::<T>::insert(auction_id, auction);

			Self::deposit_event(Event::RoundSettled {
				auction_id,
				round,
				winners: winners_count,
				remaining_items,
			});
		}

		Ok(())
	}

	/// Active bids of an auction, strongest first.
	pub fn leaderboard(auction_id: AuctionId, limit: usize) -> Vec<(T::AccountId, EntryId, BidInfo)> {
		let mut entries: Vec<(T::AccountId, EntryId, BidInfo)> = Bids::<T>::iter_prefix(auction_id)
			.filter(|(_, bid)| bid.active)
			.map(|((who, entry_id), bid)| (who, entry_id, bid))
			.collect();
		entries.sort_by(|(_, _, a), (_, _, b)| b.amount_cents.cmp(&a.amount_cents).then(a.seq.cmp(&b.seq)));
		entries.truncate(limit);
		entries
	}

	/// Winners of an auction ordered by gift number.
	pub fn winner_list(auction_id: AuctionId, limit: usize) -> Vec<(GiftNumber, WinnerInfo<T::AccountId>)> {
		let next_gift_number = Self::auctions(auction_id).map_or(1, |auction| auction.next_gift_number);
		(1..next_gift_number)
			.take(limit)
			.filter_map(|gift_number| Self::winners(auction_id, gift_number).map(|winner| (gift_number, winner)))
			.collect()
	}

	/// Recompute the money invariants without mutating state: every
	/// wallet's reserved balance must equal the sum of its active bids on
	/// auctions that still hold the money.
	pub fn check_invariants() -> InvariantReport<T::AccountId> {
		let mut active_by_user: BTreeMap<T::AccountId, Balance> = BTreeMap::new();
		let mut sum_active_bid_cents: Balance = 0;
		for (auction_id, auction) in Auctions::<T>::iter() {
			if matches!(auction.status, AuctionStatus::Ended) {
				continue;
			}
			for ((who, _), bid) in Bids::<T>::iter_prefix(auction_id) {
				if bid.active {
					sum_active_bid_cents = sum_active_bid_cents.saturating_add(bid.amount_cents);
					active_by_user
						.entry(who)
						.and_modify(|sum| *sum = sum.saturating_add(bid.amount_cents))
						.or_insert(bid.amount_cents);
				}
			}
		}

		let mut sum_reserved_cents: Balance = 0;
		let mut mismatches: Vec<(T::AccountId, Balance, Balance)> = Vec::new();
		for (who, _available, reserved) in T::Wallet::wallet_snapshots() {
			sum_reserved_cents = sum_reserved_cents.saturating_add(reserved);
			let active = active_by_user.remove(&who).unwrap_or(0);
			if active != reserved {
				mismatches.push((who, reserved, active));
			}
		}
		// active bids held by accounts without a wallet row
		for (who, active) in active_by_user {
			mismatches.push((who, 0, active));
		}

		InvariantReport {
			ok: mismatches.is_empty(),
			sum_active_bid_cents,
			sum_reserved_cents,
			mismatches,
		}
	}

	fn submit_unsigned_settlement_tx(auction_id: AuctionId) {
		let call = Call::<T>::settle_round { auction_id };
		if SubmitTransaction::<T, Call<T>>::submit_unsigned_transaction(call.into()).is_err() {
			log::info!(
				target: "gift-auction offchain worker",
				"submit unsigned settlement tx for auction {:?} failed!",
				auction_id,
			);
		}
	}

	fn submit_unsigned_lease_release_tx(auction_id: AuctionId) {
		let call = Call::<T>::release_stale_lease { auction_id };
		if SubmitTransaction::<T, Call<T>>::submit_unsigned_transaction(call.into()).is_err() {
			log::info!(
				target: "gift-auction offchain worker",
				"submit unsigned lease release tx for auction {:?} failed!",
				auction_id,
			);
		}
	}

	fn _offchain_worker() -> Result<(), OffchainErr> {
		// check if we are a potential validator
		if !sp_io::offchain::is_validator() {
			return Err(OffchainErr::NotValidator);
		}

		// acquire offchain worker lock; at most one scan in flight, the
		// deadline bounds overrun
		let lock_expiration = Duration::from_millis(LOCK_DURATION);
		let mut lock = StorageLock::<'_, Time>::with_deadline(&OFFCHAIN_WORKER_LOCK, lock_expiration);
		let mut guard = lock.try_lock().map_err(|_| OffchainErr::OffchainLock)?;

		// resume where the previous scan stopped, if it was cut short
		let mut to_be_continue = StorageValueRef::persistent(&OFFCHAIN_WORKER_DATA);
		let start_key = to_be_continue.get::<Vec<u8>>().ok().flatten();

		let max_iterations = StorageValueRef::persistent(&OFFCHAIN_WORKER_MAX_ITERATIONS)
			.get::<u32>()
			.ok()
			.flatten()
			.unwrap_or(DEFAULT_MAX_ITERATIONS);

		log::debug!(
			target: "gift-auction offchain worker",
			"max iterations is {:?}",
			max_iterations,
		);

		let now = Self::now_secs();
		let mut iterator = match start_key {
			Some(key) => Auctions::<T>::iter_from(key),
			None => Auctions::<T>::iter(),
		};
		let mut iteration_count: u32 = 0;
		let mut finished = true;
		#[allow(clippy::while_let_on_iterator)]
		while let Some((auction_id, auction)) = iterator.next() {
			match auction.lease {
				Some(lease) if lease.is_stale(now) => Self::submit_unsigned_lease_release_tx(auction_id),
				Some(_) => {}
				None if auction.is_due(now) => Self::submit_unsigned_settlement_tx(auction_id),
				None => {}
			}

			iteration_count += 1;
			if iteration_count == max_iterations {
				finished = false;
				break;
			}
			guard.extend_lock().map_err(|_| OffchainErr::OffchainLock)?;
		}

		if finished {
			to_be_continue.clear();
		} else {
			to_be_continue.set(&iterator.last_raw_key().to_vec());
		}

		// Consume the guard but **do not** unlock the underlying lock.
		guard.forget();

		Ok(())
	}
}
