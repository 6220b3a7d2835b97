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

#![allow(unused_parens)]
#![allow(unused_imports)]
#![allow(clippy::unnecessary_cast)]

use frame_support::{
	traits::Get,
	weights::{constants::RocksDbWeight, Weight},
};
use sp_std::marker::PhantomData;

/// Weight functions needed for module_auction.
pub trait WeightInfo {
	fn create_auction() -> Weight;
	fn start_auction() -> Weight;
	fn place_bid() -> Weight;
	fn settle_round() -> Weight;
	fn release_stale_lease() -> Weight;
}

/// Weights for module_auction using the Giftdrop node and recommended hardware.
pub struct GiftdropWeight<T>(PhantomData<T>);
impl<T: frame_system::Config> WeightInfo for GiftdropWeight<T> {
	fn create_auction() -> Weight {
		Weight::from_parts(30_000_000, 3593)
			.saturating_add(T::DbWeight::get().reads(1))
			.saturating_add(T::DbWeight::get().writes(2))
	}
	fn start_auction() -> Weight {
		Weight::from_parts(26_000_000, 3593)
			.saturating_add(T::DbWeight::get().reads(1))
			.saturating_add(T::DbWeight::get().writes(1))
	}
	fn place_bid() -> Weight {
		Weight::from_parts(64_000_000, 6196)
			.saturating_add(T::DbWeight::get().reads(4))
			.saturating_add(T::DbWeight::get().writes(5))
	}
	fn settle_round() -> Weight {
		Weight::from_parts(320_000_000, 6196)
			.saturating_add(T::DbWeight::get().reads(12))
			.saturating_add(T::DbWeight::get().writes(12))
	}
	fn release_stale_lease() -> Weight {
		Weight::from_parts(24_000_000, 3593)
			.saturating_add(T::DbWeight::get().reads(1))
			.saturating_add(T::DbWeight::get().writes(1))
	}
}

// For backwards compatibility and tests
impl WeightInfo for () {
	fn create_auction() -> Weight {
		Weight::from_parts(30_000_000, 3593)
			.saturating_add(RocksDbWeight::get().reads(1))
			.saturating_add(RocksDbWeight::get().writes(2))
	}
	fn start_auction() -> Weight {
		Weight::from_parts(26_000_000, 3593)
			.saturating_add(RocksDbWeight::get().reads(1))
			.saturating_add(RocksDbWeight::get().writes(1))
	}
	fn place_bid() -> Weight {
		Weight::from_parts(64_000_000, 6196)
			.saturating_add(RocksDbWeight::get().reads(4))
			.saturating_add(RocksDbWeight::get().writes(5))
	}
	fn settle_round() -> Weight {
		Weight::from_parts(320_000_000, 6196)
			.saturating_add(RocksDbWeight::get().reads(12))
			.saturating_add(RocksDbWeight::get().writes(12))
	}
	fn release_stale_lease() -> Weight {
		Weight::from_parts(24_000_000, 3593)
			.saturating_add(RocksDbWeight::get().reads(1))
			.saturating_add(RocksDbWeight::get().writes(1))
	}
}
