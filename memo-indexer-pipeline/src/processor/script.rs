use bitcoin::Script;
use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::script::Instruction;

use crate::errors::DecodeError;

/// An `OP_RETURN` output split into its protocol marker and data pushes.
#[derive(Debug, PartialEq, Eq)]
pub struct MemoScript<'a> {
    pub prefix: u8,
    pub kind: u8,
    pub fields: Vec<&'a [u8]>,
}

/// Splits an output script of the form `OP_RETURN <prefix kind> <push>...`.
///
/// Scripts that do not start with `OP_RETURN` followed by a two byte push are
/// not protocol payloads. Once the marker is found, anything but data pushes
/// makes the script malformed.
pub fn parse_memo_script(bytes: &[u8]) -> Result<MemoScript<'_>, DecodeError> {
    let mut instructions = Script::from_bytes(bytes).instructions();

    match instructions.next() {
        Some(Ok(Instruction::Op(op))) if op == OP_RETURN => {}
        _ => return Err(DecodeError::NotProtocol),
    }
    let (prefix, kind) = match instructions.next() {
        Some(Ok(Instruction::PushBytes(marker))) => match marker.as_bytes() {
            [prefix, kind] => (*prefix, *kind),
            _ => return Err(DecodeError::NotProtocol),
        },
        _ => return Err(DecodeError::NotProtocol),
    };

    let mut fields = Vec::new();
    for instruction in instructions {
        match instruction {
            Ok(Instruction::PushBytes(data)) => fields.push(data.as_bytes()),
            Ok(Instruction::Op(op)) => {
                return Err(DecodeError::MalformedScript(format!(
                    "unexpected opcode {op}"
                )));
            }
            Err(e) => return Err(DecodeError::MalformedScript(e.to_string())),
        }
    }

    Ok(MemoScript {
        prefix,
        kind,
        fields,
    })
}
