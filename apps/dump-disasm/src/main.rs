// This file is part of Retrodump.
//
// Retrodump is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Retrodump is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Retrodump.  If not, see <http://www.gnu.org/licenses/>.
use anyhow::Result;
use std::fs;
use structopt::StructOpt;
use winpe::PortableExecutable;
use x86::{disassemble_at, Disassembly};

/// Disassemble 32-bit x86 code from PE images or raw fragments
#[derive(Debug, StructOpt)]
struct Opt {
    /// Files to disassemble
    inputs: Vec<String>,

    /// Treat inputs as raw code fragments instead of PE images
    #[structopt(long)]
    raw: bool,

    /// Base address for raw fragments (hex)
    #[structopt(long, parse(try_from_str = parse_hex), default_value = "0")]
    base: u32,

    /// Only disassemble the named section
    #[structopt(long)]
    section: Option<String>,

    /// Show the import table
    #[structopt(long)]
    imports: bool,

    /// Show the export table
    #[structopt(long)]
    exports: bool,
}

fn parse_hex(s: &str) -> Result<u32> {
    let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
    Ok(u32::from_str_radix(trimmed, 16)?)
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    for input in &opt.inputs {
        let content = fs::read(input)?;
        println!("{}", input);
        println!("{}", "=".repeat(input.len()));
        if opt.raw {
            show_listing(&content, opt.base);
        } else {
            show_pe(&opt, &content)?;
        }
        println!();
    }
    Ok(())
}

fn show_pe(opt: &Opt, content: &[u8]) -> Result<()> {
    let pe = PortableExecutable::from_bytes(content)?;
    println!("image base: 0x{:08X}", pe.image_base);
    println!("entry rva:  0x{:08X}", pe.entry_point);

    if opt.imports {
        println!("imports -");
        for import in &pe.imports {
            match (&import.name, import.ordinal) {
                (Some(name), _) => {
                    println!("\t{:20} {} @ 0x{:08X}", import.dll, name, import.iat_vaddr)
                }
                (None, Some(ordinal)) => println!(
                    "\t{:20} #{} @ 0x{:08X}",
                    import.dll, ordinal, import.iat_vaddr
                ),
                _ => {}
            }
        }
    }
    if opt.exports {
        println!("exports -");
        for export in &pe.exports {
            match &export.forwarder {
                Some(target) => println!("\t{:3} {:20} -> {}", export.ordinal, export.name, target),
                None => println!(
                    "\t{:3} {:20} @ rva 0x{:08X}",
                    export.ordinal, export.name, export.rva
                ),
            }
        }
    }

    for section in pe.sections.iter() {
        let selected = match &opt.section {
            Some(name) => &section.name == name,
            None => section.is_executable(),
        };
        if !selected {
            continue;
        }
        println!(
            "section {} @ vaddr 0x{:X}, {} raw bytes",
            section.name, section.virtual_address, section.raw_size
        );
        let base = pe.image_base.wrapping_add(section.virtual_address);
        show_listing(pe.section_data(section), base);
    }
    Ok(())
}

fn show_listing(code: &[u8], base: u32) {
    let disassembly = disassemble_at(code, base);
    for inst in &disassembly.instructions {
        let bytes = inst
            .raw
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ");
        println!("  {:08X}  {:24}  {}", inst.address, bytes, inst);
    }
    print_summary(&disassembly);
}

fn print_summary(disassembly: &Disassembly) {
    let unknown = disassembly
        .instructions
        .iter()
        .filter(|i| i.is_unknown())
        .count();
    print!(
        "  -- {} instructions, {} bytes",
        disassembly.instructions.len(),
        disassembly.byte_count()
    );
    if unknown > 0 {
        print!(", {} unknown", unknown);
    }
    if let Some(phase) = disassembly.truncated {
        print!(", truncated while reading {}", phase);
    }
    println!();
}
