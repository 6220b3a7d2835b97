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

//! Mocks for the gift auction module.

#![cfg(test)]

use super::*;
use crate as auction;
use frame_support::{
	construct_runtime, ord_parameter_types, parameter_types,
	traits::{ConstU32, ConstU64, Everything},
};
use frame_system::EnsureSignedBy;
use sp_core::H256;
use sp_runtime::{testing::TestXt, traits::IdentityLookup, BuildStorage};

pub type AccountId = u128;

pub const ALICE: AccountId = 1;
pub const BOB: AccountId = 2;
pub const CAROL: AccountId = 3;
pub const ADMIN: AccountId = 100;

impl frame_system::Config for Runtime {
	type BaseCallFilter = Everything;
	type BlockWeights = ();
	type BlockLength = ();
	type RuntimeOrigin = RuntimeOrigin;
	type RuntimeCall = RuntimeCall;
	type Nonce = u64;
	type Hash = H256;
	type Hashing = ::sp_runtime::traits::BlakeTwo256;
	type AccountId = AccountId;
	type Lookup = IdentityLookup<Self::AccountId>;
	type Block = Block;
	type RuntimeEvent = RuntimeEvent;
	type BlockHashCount = ConstU64<250>;
	type DbWeight = ();
	type Version = ();
	type PalletInfo = PalletInfo;
	type AccountData = ();
	type OnNewAccount = ();
	type OnKilledAccount = ();
	type SystemWeightInfo = ();
	type SS58Prefix = ();
	type OnSetCode = ();
	type MaxConsumers = ConstU32<16>;
}

parameter_types! {
	pub const MinimumPeriod: u64 = 1000;
}

impl pallet_timestamp::Config for Runtime {
	type Moment = u64;
	type OnTimestampSet = ();
	type MinimumPeriod = MinimumPeriod;
	type WeightInfo = ();
}

ord_parameter_types! {
	pub const Admin: AccountId = ADMIN;
}

impl module_wallet::Config for Runtime {
	type RuntimeEvent = RuntimeEvent;
	type UpdateOrigin = EnsureSignedBy<Admin, AccountId>;
	type UnixTime = Timestamp;
	type WeightInfo = ();
}

parameter_types! {
	pub const UnsignedPriority: u64 = 1 << 20;
}

impl auction::Config for Runtime {
	type RuntimeEvent = RuntimeEvent;
	type Wallet = Wallet;
	type UnixTime = Timestamp;
	type CreateOrigin = EnsureSignedBy<Admin, AccountId>;
	type UnsignedPriority = UnsignedPriority;
	type WeightInfo = ();
}

/// An extrinsic type used for tests.
pub type Extrinsic = TestXt<RuntimeCall, ()>;

impl<LocalCall> frame_system::offchain::SendTransactionTypes<LocalCall> for Runtime
where
	RuntimeCall: From<LocalCall>,
{
	type OverarchingCall = RuntimeCall;
	type Extrinsic = Extrinsic;
}

type Block = frame_system::mocking::MockBlock<Runtime>;

construct_runtime!(
	pub enum Runtime {
		System: frame_system,
		Timestamp: pallet_timestamp,
		Wallet: module_wallet,
		GiftAuction: auction,
	}
);

pub const INITIAL_NOW_SECS: u64 = 1_000;

pub fn set_now_secs(secs: u64) {
	Timestamp::set_timestamp(secs * 1000);
}

pub struct ExtBuilder {
	users: Vec<(AccountId, Vec<u8>, Balance)>,
}

impl Default for ExtBuilder {
	fn default() -> Self {
		Self {
			users: vec![
				(ALICE, b"alice".to_vec(), 10_000),
				(BOB, b"bob".to_vec(), 10_000),
				(CAROL, b"carol".to_vec(), 10_000),
			],
		}
	}
}

impl ExtBuilder {
	pub fn users(mut self, users: Vec<(AccountId, Vec<u8>, Balance)>) -> Self {
		self.users = users;
		self
	}

	pub fn build(self) -> sp_io::TestExternalities {
		let mut t = frame_system::GenesisConfig::<Runtime>::default()
			.build_storage()
			.unwrap();

		module_wallet::GenesisConfig::<Runtime> { users: self.users }
			.assimilate_storage(&mut t)
			.unwrap();

		let mut ext = sp_io::TestExternalities::new(t);
		ext.execute_with(|| {
			System::set_block_number(1);
			set_now_secs(INITIAL_NOW_SECS);
		});
		ext
	}
}
