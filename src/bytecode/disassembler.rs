//! Bytecode disassembler for debugging.

use std::fmt::Write;

use crate::bytecode::instruction::{read_operands, OpCode};

/// Render an instruction stream as one `offset mnemonic operands` line per
/// instruction. A byte no opcode is defined for renders an ERROR line and
/// decoding continues at the next byte.
pub fn disassemble(code: &[u8]) -> String {
    let mut out = String::new();
    let mut offset = 0;

    while offset < code.len() {
        let Some(op) = OpCode::from_u8(code[offset]) else {
            let _ = writeln!(out, "{:04} ERROR: undefined opcode: {}", offset, code[offset]);
            offset += 1;
            continue;
        };

        let (operands, read) = read_operands(op, &code[offset + 1..]);
        let _ = writeln!(out, "{:04} {}", offset, format_instruction(op, &operands));
        offset += 1 + read;
    }

    out
}

fn format_instruction(op: OpCode, operands: &[usize]) -> String {
    match operands {
        [] => op.mnemonic().to_string(),
        [a] => format!("{} {}", op.mnemonic(), a),
        [a, b] => format!("{} {} {}", op.mnemonic(), a, b),
        _ => format!("ERROR: unhandled operand count for {}", op.mnemonic()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::instruction::make;

    #[test]
    fn disassembles_a_stream() {
        let mut code = Vec::new();
        code.extend(make(OpCode::Add, &[]));
        code.extend(make(OpCode::GetLocal, &[1]));
        code.extend(make(OpCode::Constant, &[2]));
        code.extend(make(OpCode::Constant, &[65535]));
        code.extend(make(OpCode::Closure, &[65535, 255]));

        let expected = "\
0000 Add
0001 GetLocal 1
0003 Constant 2
0006 Constant 65535
0009 Closure 65535 255
";
        assert_eq!(disassemble(&code), expected);
    }

    #[test]
    fn flags_undefined_bytes() {
        let code = vec![OpCode::Add as u8, 255];
        let output = disassemble(&code);
        assert!(output.contains("ERROR: undefined opcode: 255"));
    }
}
