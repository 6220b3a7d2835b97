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

//! # Wallet Module
//!
//! ## Overview
//!
//! Keeps one wallet per registered user, split into an available and a
//! reserved half, with an append-only ledger auditing every movement.
//! Top-up is an administrative credit; reservation, charge and refund are
//! driven by the auction engine through the `WalletManager` trait. Both
//! halves are integer cents and can never go negative.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::unused_unit)]

use frame_support::{pallet_prelude::*, traits::UnixTime, transactional};
use frame_system::pallet_prelude::*;
use primitives::{Balance, LedgerKind, LedgerRef, Moment};
use sp_runtime::traits::Zero;
use sp_std::prelude::*;
use support::WalletManager;

mod mock;
mod tests;
pub mod weights;

pub use module::*;
pub use weights::WeightInfo;

pub const MIN_USERNAME_LEN: usize = 1;
pub const MAX_USERNAME_LEN: usize = 32;

/// A user wallet.
#[derive(Encode, Decode, Clone, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct WalletInfo {
	/// Unique name the user registered under.
	pub username: Vec<u8>,
	/// Cents free to be reserved by new bids.
	pub available_cents: Balance,
	/// Cents locked behind active bids.
	pub reserved_cents: Balance,
}

/// One audit row. `amount_cents` is always positive; the direction of the
/// movement is encoded in `kind`.
#[derive(Encode, Decode, Clone, PartialEq, Eq, RuntimeDebug, TypeInfo)]
pub struct LedgerEntry {
	pub kind: LedgerKind,
	pub amount_cents: Balance,
	pub reference: LedgerRef,
	/// Unix seconds of the movement.
	pub at: Moment,
}

#[frame_support::pallet]
pub mod module {
	use super::*;

	#[pallet::config]
	pub trait Config: frame_system::Config {
		type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

		/// The origin which may credit wallets. Root can always do this.
		type UpdateOrigin: EnsureOrigin<Self::RuntimeOrigin>;

		/// Time source for ledger timestamps.
		type UnixTime: UnixTime;

		/// Weight information for the extrinsics in this module.
		type WeightInfo: WeightInfo;
	}

	#[pallet::error]
	pub enum Error<T> {
		/// Username length is out of bounds.
		InvalidUsername,
		/// The username already belongs to another account.
		UsernameTaken,
		/// The account already owns a wallet.
		AlreadyRegistered,
		/// No wallet exists for the account.
		UserNotFound,
		/// Money amounts must be positive.
		AmountMustBePositive,
		/// The available half of the wallet cannot cover the movement.
		InsufficientAvailableBalance,
		/// The reserved half of the wallet cannot cover the movement.
		InsufficientReservedBalance,
		/// Balance arithmetic overflowed.
		BalanceOverflow,
	}

	#[pallet::event]
	#[pallet::generate_deposit(pub(crate) fn deposit_event)]
	pub enum Event<T: Config> {
		/// A new user registered a wallet.
		UserRegistered { who: T::AccountId, username: Vec<u8> },
		/// The available balance was credited administratively.
		ToppedUp { who: T::AccountId, amount_cents: Balance },
		/// Available balance was locked behind a bid.
		Reserved { who: T::AccountId, amount_cents: Balance },
		/// Reserved balance was handed back to available.
		Released { who: T::AccountId, amount_cents: Balance },
		/// Reserved balance was taken as payment for a won item.
		Charged { who: T::AccountId, amount_cents: Balance },
		/// Reserved balance was refunded to available.
		Refunded { who: T::AccountId, amount_cents: Balance },
	}

	/// Wallet of each registered user.
	///
	/// Wallets: map AccountId => Option<WalletInfo>
	#[pallet::storage]
	#[pallet::getter(fn wallets)]
	pub type Wallets<T: Config> = StorageMap<_, Blake2_128Concat, T::AccountId, WalletInfo, OptionQuery>;

	/// Reverse lookup enforcing username uniqueness.
	///
	/// Usernames: map Vec<u8> => Option<AccountId>
	#[pallet::storage]
	#[pallet::getter(fn username_owner)]
	pub type Usernames<T: Config> = StorageMap<_, Blake2_128Concat, Vec<u8>, T::AccountId, OptionQuery>;

	/// Append-only money audit log, one row per atomic movement. Rows are
	/// inserted at the next free index per user and never touched again.
	///
	/// Ledger: double map AccountId, u64 => Option<LedgerEntry>
	#[pallet::storage]
	#[pallet::getter(fn ledger_entry)]
	pub type Ledger<T: Config> =
		StorageDoubleMap<_, Blake2_128Concat, T::AccountId, Twox64Concat, u64, LedgerEntry, OptionQuery>;

	/// Number of ledger rows per user; the next row is appended at this
	/// index.
	///
	/// LedgerCount: map AccountId => u64
	#[pallet::storage]
	#[pallet::getter(fn ledger_count)]
	pub type LedgerCount<T: Config> = StorageMap<_, Blake2_128Concat, T::AccountId, u64, ValueQuery>;

	#[pallet::genesis_config]
	#[derive(frame_support::DefaultNoBound)]
	pub struct GenesisConfig<T: Config> {
		/// `(account, username, initial available cents)`
		pub users: Vec<(T::AccountId, Vec<u8>, Balance)>,
	}

	#[pallet::genesis_build]
	impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
		fn build(&self) {
			for (who, username, initial_cents) in &self.users {
				assert!(
					!Usernames::<T>::contains_key(username),
					"duplicate username in genesis"
				);
				Usernames::<T>::insert(username, who);
				Wallets::<T>::insert(
					who,
					WalletInfo {
						username: username.clone(),
						available_cents: *initial_cents,
						reserved_cents: 0,
					},
				);
				// seed credits go through the ledger so that replaying it
				// reproduces the wallet
				if !initial_cents.is_zero() {
					Pallet::<T>::append_ledger(who, LedgerKind::Topup, *initial_cents, LedgerRef::Admin, 0);
				}
			}
		}
	}

	#[pallet::pallet]
	#[pallet::without_storage_info]
	pub struct Pallet<T>(_);

	#[pallet::hooks]
	impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {}

	#[pallet::call]
	impl<T: Config> Pallet<T> {
		/// Register the caller as a user with a unique `username` and an
		/// empty wallet.
		#[pallet::call_index(0)]
		#[pallet::weight(<T as Config>::WeightInfo::register())]
		#[transactional]
		pub fn register(origin: OriginFor<T>, username: Vec<u8>) -> DispatchResult {
			let who = ensure_signed(origin)?;
			ensure!(
				(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&username.len()),
				Error::<T>::InvalidUsername
			);
			ensure!(!Wallets::<T>::contains_key(&who), Error::<T>::AlreadyRegistered);
			ensure!(!Usernames::<T>::contains_key(&username), Error::<T>::UsernameTaken);

			Usernames::<T>::insert(&username, &who);
			Wallets::<T>::insert(
				&who,
				WalletInfo {
					username: username.clone(),
					available_cents: 0,
					reserved_cents: 0,
				},
			);

			Self::deposit_event(Event::UserRegistered { who, username });
			Ok(())
		}

		/// Credit `amount_cents` to the available half of `who`'s wallet.
		///
		/// The dispatch origin of this call must be `UpdateOrigin`. There is
		/// no payment gateway behind top-up; it is an operator credit.
		#[pallet::call_index(1)]
		#[pallet::weight(<T as Config>::WeightInfo::topup())]
		#[transactional]
		pub fn topup(
			origin: OriginFor<T>,
			who: T::AccountId,
			#[pallet::compact] amount_cents: Balance,
		) -> DispatchResult {
			T::UpdateOrigin::ensure_origin(origin)?;
			ensure!(!amount_cents.is_zero(), Error::<T>::AmountMustBePositive);

			Wallets::<T>::try_mutate(&who, |maybe_wallet| -> DispatchResult {
				let wallet = maybe_wallet.as_mut().ok_or(Error::<T>::UserNotFound)?;
				wallet.available_cents = wallet
					.available_cents
					.checked_add(amount_cents)
					.ok_or(Error::<T>::BalanceOverflow)?;
				Ok(())
			})?;
			Self::append_ledger(&who, LedgerKind::Topup, amount_cents, LedgerRef::Admin, Self::now_secs());

			Self::deposit_event(Event::ToppedUp { who, amount_cents });
			Ok(())
		}
	}
}

impl<T: Config> Pallet<T> {
	fn now_secs() -> Moment {
		T::UnixTime::now().as_secs()
	}

	fn append_ledger(who: &T::AccountId, kind: LedgerKind, amount_cents: Balance, reference: LedgerRef, at: Moment) {
		let index = LedgerCount::<T>::get(who);
		Ledger::<T>::insert(
			who,
			index,
			LedgerEntry {
				kind,
				amount_cents,
				reference,
				at,
			},
		);
		LedgerCount::<T>::insert(who, index + 1);
	}

	/// Ledger rows of `who`, newest first, at most `limit`.
	pub fn ledger(who: &T::AccountId, limit: usize) -> Vec<LedgerEntry> {
		let count = LedgerCount::<T>::get(who);
		(0..count)
			.rev()
			.take(limit)
			.filter_map(|index| Ledger::<T>::get(who, index))
			.collect()
	}

	fn mutate_wallet(who: &T::AccountId, f: impl FnOnce(&mut WalletInfo) -> DispatchResult) -> DispatchResult {
		Wallets::<T>::try_mutate(who, |maybe_wallet| {
			let wallet = maybe_wallet.as_mut().ok_or(Error::<T>::UserNotFound)?;
			f(wallet)
		})
	}
}

impl<T: Config> WalletManager<T::AccountId> for Pallet<T> {
	fn is_registered(who: &T::AccountId) -> bool {
		Wallets::<T>::contains_key(who)
	}

	fn available_cents(who: &T::AccountId) -> Balance {
		Self::wallets(who).map_or(0, |wallet| wallet.available_cents)
	}

	fn reserved_cents(who: &T::AccountId) -> Balance {
		Self::wallets(who).map_or(0, |wallet| wallet.reserved_cents)
	}

	fn reserve(who: &T::AccountId, amount_cents: Balance, reference: LedgerRef) -> DispatchResult {
		ensure!(!amount_cents.is_zero(), Error::<T>::AmountMustBePositive);
		Self::mutate_wallet(who, |wallet| {
			wallet.available_cents = wallet
				.available_cents
				.checked_sub(amount_cents)
				.ok_or(Error::<T>::InsufficientAvailableBalance)?;
			wallet.reserved_cents = wallet
				.reserved_cents
				.checked_add(amount_cents)
				.ok_or(Error::<T>::BalanceOverflow)?;
			Ok(())
		})?;
		Self::append_ledger(who, LedgerKind::Reserve, amount_cents, reference, Self::now_secs());
		Self::deposit_event(Event::Reserved {
			who: who.clone(),
			amount_cents,
		});
		Ok(())
	}

	fn release(who: &T::AccountId, amount_cents: Balance, reference: LedgerRef) -> DispatchResult {
		ensure!(!amount_cents.is_zero(), Error::<T>::AmountMustBePositive);
		Self::mutate_wallet(who, |wallet| {
			wallet.reserved_cents = wallet
				.reserved_cents
				.checked_sub(amount_cents)
				.ok_or(Error::<T>::InsufficientReservedBalance)?;
			wallet.available_cents = wallet
				.available_cents
				.checked_add(amount_cents)
				.ok_or(Error::<T>::BalanceOverflow)?;
			Ok(())
		})?;
		Self::append_ledger(who, LedgerKind::Release, amount_cents, reference, Self::now_secs());
		Self::deposit_event(Event::Released {
			who: who.clone(),
			amount_cents,
		});
		Ok(())
	}

	fn charge_reserved(who: &T::AccountId, amount_cents: Balance, reference: LedgerRef) -> DispatchResult {
		ensure!(!amount_cents.is_zero(), Error::<T>::AmountMustBePositive);
		Self::mutate_wallet(who, |wallet| {
			wallet.reserved_cents = wallet
				.reserved_cents
				.checked_sub(amount_cents)
				.ok_or(Error::<T>::InsufficientReservedBalance)?;
			Ok(())
		})?;
		Self::append_ledger(who, LedgerKind::Charge, amount_cents, reference, Self::now_secs());
		Self::deposit_event(Event::Charged {
			who: who.clone(),
			amount_cents,
		});
		Ok(())
	}

	fn refund_reserved(who: &T::AccountId, amount_cents: Balance, reference: LedgerRef) -> DispatchResult {
		ensure!(!amount_cents.is_zero(), Error::<T>::AmountMustBePositive);
		Self::mutate_wallet(who, |wallet| {
			wallet.reserved_cents = wallet
				.reserved_cents
				.checked_sub(amount_cents)
				.ok_or(Error::<T>::InsufficientReservedBalance)?;
			wallet.available_cents = wallet
				.available_cents
				.checked_add(amount_cents)
				.ok_or(Error::<T>::BalanceOverflow)?;
			Ok(())
		})?;
		Self::append_ledger(who, LedgerKind::Refund, amount_cents, reference, Self::now_secs());
		Self::deposit_event(Event::Refunded {
			who: who.clone(),
			amount_cents,
		});
		Ok(())
	}

	fn wallet_snapshots() -> Vec<(T::AccountId, Balance, Balance)> {
		Wallets::<T>::iter()
			.map(|(who, wallet)| (who, wallet.available_cents, wallet.reserved_cents))
			.collect()
	}
}
