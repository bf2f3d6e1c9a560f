//! Transaction classification
//!
//! Maps the leading 4-byte selector of a pending transaction onto the V2
//! router swap table and ABI-decodes the arguments. Classification is a pure
//! function of the transaction: no I/O, no shared state.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, U256};

use crate::error::DecodeError;
use crate::types::{ClassifiedSwap, PendingTransaction, SwapMethod};

/// Router swap selectors (UniswapV2Router02 and forks)
pub const SWAP_SELECTORS: [([u8; 4], SwapMethod); 6] = [
    ([0x38, 0xed, 0x17, 0x39], SwapMethod::SwapExactTokensForTokens),
    ([0x88, 0x03, 0xdb, 0xee], SwapMethod::SwapTokensForExactTokens),
    ([0x7f, 0xf3, 0x6a, 0xb5], SwapMethod::SwapExactEthForTokens),
    ([0x4a, 0x25, 0xd9, 0x4a], SwapMethod::SwapTokensForExactEth),
    ([0x18, 0xcb, 0xaf, 0xe5], SwapMethod::SwapExactTokensForEth),
    ([0xfb, 0x3b, 0xdb, 0x41], SwapMethod::SwapEthForExactTokens),
];

/// Result of classifying one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Fully decoded swap
    Swap(ClassifiedSwap),
    /// Known swap selector whose arguments could not be decoded
    Unparsed { method: SwapMethod, error: DecodeError },
    /// No calldata, short calldata, or a selector outside the table
    NotSwap,
}

impl Classification {
    pub fn swap(self) -> Option<ClassifiedSwap> {
        match self {
            Classification::Swap(swap) => Some(swap),
            _ => None,
        }
    }

    pub fn method(&self) -> Option<SwapMethod> {
        match self {
            Classification::Swap(swap) => Some(swap.method),
            Classification::Unparsed { method, .. } => Some(*method),
            Classification::NotSwap => None,
        }
    }
}

#[inline(always)]
pub fn method_for_selector(selector: &[u8]) -> Option<SwapMethod> {
    match selector {
        [0x38, 0xed, 0x17, 0x39] => Some(SwapMethod::SwapExactTokensForTokens),
        [0x88, 0x03, 0xdb, 0xee] => Some(SwapMethod::SwapTokensForExactTokens),
        [0x7f, 0xf3, 0x6a, 0xb5] => Some(SwapMethod::SwapExactEthForTokens),
        [0x4a, 0x25, 0xd9, 0x4a] => Some(SwapMethod::SwapTokensForExactEth),
        [0x18, 0xcb, 0xaf, 0xe5] => Some(SwapMethod::SwapExactTokensForEth),
        [0xfb, 0x3b, 0xdb, 0x41] => Some(SwapMethod::SwapEthForExactTokens),
        _ => None,
    }
}

pub fn selector(method: SwapMethod) -> [u8; 4] {
    SWAP_SELECTORS
        .iter()
        .find(|(_, m)| *m == method)
        .map(|(sel, _)| *sel)
        .unwrap_or_default()
}

/// Classify a pending transaction, keeping the reason a swap was not produced
pub fn decode(tx: &PendingTransaction) -> Classification {
    let Some(router) = tx.to else {
        return Classification::NotSwap;
    };
    let data = tx.data.as_ref();
    if data.len() < 4 {
        return Classification::NotSwap;
    }
    let Some(method) = method_for_selector(&data[..4]) else {
        return Classification::NotSwap;
    };

    match decode_args(method, &data[4..], tx.value_wei) {
        Ok(args) => Classification::Swap(ClassifiedSwap {
            source_hash: tx.hash,
            router,
            method,
            path: args.path,
            amount_in: args.amount_in,
            amount_out_min: args.amount_out_min,
            deadline: args.deadline,
            value_wei: tx.value_wei,
        }),
        Err(error) => Classification::Unparsed { method, error },
    }
}

/// Decoded swap, or `None` for anything that is not a well-formed swap
pub fn classify(tx: &PendingTransaction) -> Option<ClassifiedSwap> {
    decode(tx).swap()
}

struct SwapArgs {
    path: Vec<Address>,
    amount_in: U256,
    amount_out_min: U256,
    deadline: U256,
}

fn schema(method: SwapMethod) -> Vec<ParamType> {
    let path = ParamType::Array(Box::new(ParamType::Address));
    if method.is_eth_input() {
        // (amountOutMin | amountOut, path, to, deadline)
        vec![ParamType::Uint(256), path, ParamType::Address, ParamType::Uint(256)]
    } else {
        // (amountIn | amountOut, amountOutMin | amountInMax, path, to, deadline)
        vec![
            ParamType::Uint(256),
            ParamType::Uint(256),
            path,
            ParamType::Address,
            ParamType::Uint(256),
        ]
    }
}

fn decode_args(method: SwapMethod, args: &[u8], value: U256) -> Result<SwapArgs, DecodeError> {
    let tokens = abi::decode(&schema(method), args).map_err(|e| DecodeError::Abi(e.to_string()))?;

    let (amount_in, amount_out_min, path, deadline) = match tokens.as_slice() {
        [Token::Uint(amount_out), Token::Array(path), Token::Address(_), Token::Uint(deadline)]
            if method.is_eth_input() =>
        {
            (value, *amount_out, path, *deadline)
        }
        [Token::Uint(first), Token::Uint(second), Token::Array(path), Token::Address(_), Token::Uint(deadline)] => {
            if method.is_exact_input() {
                (*first, *second, path, *deadline)
            } else {
                (*second, *first, path, *deadline)
            }
        }
        _ => return Err(DecodeError::Layout),
    };

    let path = path
        .iter()
        .cloned()
        .map(Token::into_address)
        .collect::<Option<Vec<_>>>()
        .ok_or(DecodeError::Layout)?;
    if path.len() < 2 {
        return Err(DecodeError::ShortPath(path.len()));
    }

    Ok(SwapArgs {
        path,
        amount_in,
        amount_out_min,
        deadline,
    })
}
