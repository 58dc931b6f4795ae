// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! On-chain contract reads.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{keccak256, Address, Bytes};

use super::{encode_args, CallKey, KEY_SEPARATOR};
use crate::errors::CallError;

/// A single contract read: target contract, function signature and arguments.
///
/// The signature is human-readable, `name(inputs)(outputs)`, for example
/// `balanceOf(address)(uint256)` or `getDenormalizedWeight(address)(uint256)`.
/// The output list may be omitted for functions whose return value is not
/// needed. Arguments are kept as strings and coerced against the input types
/// when the call is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OnChainCall {
    /// Contract the call targets (its registrar)
    pub target: Address,
    /// Human-readable function signature
    pub signature: String,
    /// String-encoded arguments, one per input
    pub args: Vec<String>,
}

impl OnChainCall {
    /// Creates a call with no arguments.
    pub fn new(target: Address, signature: impl Into<String>) -> Self {
        Self {
            target,
            signature: signature.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Replaces all arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.args = args.into_iter().map(|a| a.to_string()).collect();
        self
    }

    /// The contract results are grouped under.
    pub fn registrar(&self) -> Address {
        self.target
    }

    /// Canonical key of this call.
    pub fn key(&self) -> CallKey {
        serialize_on_chain_call(self)
    }

    /// ABI-encodes the call: 4-byte selector followed by the arguments.
    pub fn encode(&self) -> Result<Bytes, CallError> {
        let parsed = ParsedSignature::parse(&self.signature)?;

        if parsed.inputs.len() != self.args.len() {
            return Err(CallError::ArgumentCount {
                signature: self.signature.clone(),
                expected: parsed.inputs.len(),
                actual: self.args.len(),
            });
        }

        let values = parsed
            .inputs
            .iter()
            .zip(&self.args)
            .enumerate()
            .map(|(index, (ty, arg))| {
                ty.coerce_str(arg)
                    .map_err(|source| CallError::InvalidArgument {
                        signature: self.signature.clone(),
                        index,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut data = parsed.selector().to_vec();
        data.extend_from_slice(&DynSolValue::Tuple(values).abi_encode_params());
        Ok(Bytes::from(data))
    }

    /// Decodes raw return data into the declared output values, in order.
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<DynSolValue>, CallError> {
        let parsed = ParsedSignature::parse(&self.signature)?;
        if parsed.outputs.is_empty() {
            return Ok(Vec::new());
        }

        let decoded = DynSolType::Tuple(parsed.outputs)
            .abi_decode_params(data)
            .map_err(|source| CallError::Decode {
                signature: self.signature.clone(),
                source,
            })?;

        match decoded {
            DynSolValue::Tuple(values) => Ok(values),
            single => Ok(vec![single]),
        }
    }
}

/// Serializes an on-chain call into its canonical key.
///
/// Format: `{target}/{signature}/{args}` where the target is lowercase
/// `0x`-hex, whitespace is stripped from the signature, and the arguments are
/// a JSON array of strings.
pub fn serialize_on_chain_call(call: &OnChainCall) -> CallKey {
    let signature: String = call.signature.split_whitespace().collect();
    CallKey::new(format!(
        "{:#x}{sep}{signature}{sep}{args}",
        call.target,
        sep = KEY_SEPARATOR,
        args = encode_args(&call.args),
    ))
}

/// A signature split into name, input types and output types.
#[derive(Debug)]
struct ParsedSignature {
    name: String,
    inputs: Vec<DynSolType>,
    outputs: Vec<DynSolType>,
}

impl ParsedSignature {
    fn parse(signature: &str) -> Result<Self, CallError> {
        let compact: String = signature.split_whitespace().collect();

        let open = compact
            .find('(')
            .ok_or_else(|| CallError::invalid_signature(signature, "missing parameter list"))?;
        let name = &compact[..open];
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(CallError::invalid_signature(signature, "invalid function name"));
        }

        let close = matching_paren(&compact, open)
            .ok_or_else(|| CallError::invalid_signature(signature, "unbalanced parentheses"))?;
        let inputs = parse_type_list(signature, &compact[open..=close])?;

        let rest = &compact[close + 1..];
        let rest = rest.strip_prefix("returns").unwrap_or(rest);
        let outputs = if rest.is_empty() {
            Vec::new()
        } else {
            let end = rest
                .starts_with('(')
                .then(|| matching_paren(rest, 0))
                .flatten()
                .filter(|end| *end == rest.len() - 1)
                .ok_or_else(|| CallError::invalid_signature(signature, "malformed output list"))?;
            parse_type_list(signature, &rest[..=end])?
        };

        Ok(Self {
            name: name.to_string(),
            inputs,
            outputs,
        })
    }

    /// `name(t1,t2,..)` with canonical type names, the preimage of the selector.
    fn canonical(&self) -> String {
        format!("{}({})", self.name, canonical_type_list(&self.inputs))
    }

    fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.canonical().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }
}

fn canonical_type_list(types: &[DynSolType]) -> String {
    types.iter().map(canonical_type_name).collect::<Vec<_>>().join(",")
}

/// Type name as it appears in a selector preimage. Tuples never carry the
/// trailing comma `sol_type_name` gives one-element tuples.
fn canonical_type_name(ty: &DynSolType) -> String {
    match ty {
        DynSolType::Tuple(types) => format!("({})", canonical_type_list(types)),
        DynSolType::Array(inner) => format!("{}[]", canonical_type_name(inner)),
        DynSolType::FixedArray(inner, len) => format!("{}[{len}]", canonical_type_name(inner)),
        other => other.sol_type_name().into_owned(),
    }
}

/// Index of the parenthesis closing the one at `open`.
fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices().skip_while(|(i, _)| *i < open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses `(t1,t2,...)` into its component types.
fn parse_type_list(signature: &str, list: &str) -> Result<Vec<DynSolType>, CallError> {
    if list == "()" {
        return Ok(Vec::new());
    }
    match DynSolType::parse(list) {
        Ok(DynSolType::Tuple(types)) => Ok(types),
        Ok(single) => Ok(vec![single]),
        Err(e) => Err(CallError::invalid_signature(signature, e.to_string())),
    }
}
