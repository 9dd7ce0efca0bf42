// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;
use fvm_ipld_encoding::DAG_CBOR;
use multihash::{Code, MultihashDigest};
use once_cell::sync::Lazy;

/// CID of the CBOR empty list, the state root of an actor before its constructor runs.
pub static EMPTY_ARR_CID: Lazy<Cid> =
    Lazy::new(|| Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(&[0x80])));

#[test]
fn test_empty_arr_cid() {
    use fvm_ipld_encoding::to_vec;

    let empty = to_vec::<[(); 0]>(&[]).unwrap();
    assert_eq!(vec![0x80], empty);
    assert_eq!(*EMPTY_ARR_CID, Cid::new_v1(DAG_CBOR, Code::Blake2b256.digest(&empty)));
    assert_eq!(
        "bafy2bzacebc3bt6cedhoyw34drrmjvazhu4oj25er2ebk4u445pzycvq4ta4a",
        EMPTY_ARR_CID.to_string()
    );
}
