//! Command line surface of `bitonic_gen`.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::generator::GeneratorConfig;
use crate::isa::{ElementType, VectorIsa};
use crate::network::InlineBudget;

pub const USAGE: &str = "\
Usage: bitonic_gen [--vector-isa ISA...] [--element-type TYPE...] [--break-inline N] --output-dir DIR

Generates bitonic sorting network headers and sources, one pair per (ISA, element type).

Options:
  --vector-isa ISA...     AVX2, AVX512, SVE or all [default: all]
  --element-type TYPE...  int32_t, uint32_t, float, int64_t, uint64_t, double
                          [default: every type the ISA supports]
  --break-inline N        Emit every width divisible by N out-of-line, 0 inlines all [default: 0]
  --output-dir DIR        Directory the files are written to, created if missing
  -h, --help              Print this help";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Generate(GeneratorConfig),
}

/// Parses the arguments following the program name.
pub fn parse_args<I, S>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args = args.into_iter().map(Into::into).collect::<Vec<String>>();

    let mut isas: Option<Vec<VectorIsa>> = None;
    let mut types: Option<Vec<ElementType>> = None;
    let mut budget = InlineBudget::default();
    let mut output_dir: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        i += 1;

        // Flags taking a list consume values up to the next flag.
        let values_end = args[i..]
            .iter()
            .position(|arg| arg.starts_with('-'))
            .map_or(args.len(), |pos| i + pos);
        let values = &args[i..values_end];

        match flag {
            "-h" | "--help" => return Ok(Command::Help),
            "--vector-isa" => {
                isas = Some(parse_isas(values)?);
                i = values_end;
            }
            "--element-type" => {
                types = Some(parse_list::<ElementType>(flag, values)?);
                i = values_end;
            }
            "--break-inline" => {
                let value = single_value(flag, values)?;
                let n = usize::from_str(value).map_err(|_| {
                    Error::Argument(format!(
                        "--break-inline expects a non-negative integer, got '{value}'"
                    ))
                })?;
                budget = InlineBudget::new(n);
                i += 1;
            }
            "--output-dir" => {
                output_dir = Some(PathBuf::from(single_value(flag, values)?));
                i += 1;
            }
            other => return Err(Error::Argument(format!("unexpected argument '{other}'"))),
        }
    }

    let output_dir =
        output_dir.ok_or_else(|| Error::Argument("--output-dir is required".to_string()))?;

    Ok(Command::Generate(GeneratorConfig {
        isas: isas.unwrap_or_else(VectorIsa::implemented),
        types,
        budget,
        output_dir,
    }))
}

fn single_value<'a>(flag: &str, values: &'a [String]) -> Result<&'a str> {
    values
        .first()
        .map(String::as_str)
        .ok_or_else(|| Error::Argument(format!("{flag} expects a value")))
}

fn parse_list<T>(flag: &str, values: &[String]) -> Result<Vec<T>>
where
    T: FromStr<Err = Error> + PartialEq,
{
    if values.is_empty() {
        return Err(Error::Argument(format!("{flag} expects at least one value")));
    }

    let mut parsed = Vec::with_capacity(values.len());
    for value in values {
        let item = T::from_str(value)?;
        // Each pair is generated once, no matter how often it's named.
        if !parsed.contains(&item) {
            parsed.push(item);
        }
    }

    Ok(parsed)
}

fn parse_isas(values: &[String]) -> Result<Vec<VectorIsa>> {
    if values.iter().any(|v| v.eq_ignore_ascii_case("all")) {
        if values.len() > 1 {
            return Err(Error::Argument(
                "--vector-isa all can't be combined with other ISAs".to_string(),
            ));
        }
        return Ok(VectorIsa::implemented());
    }

    parse_list("--vector-isa", values)
}
