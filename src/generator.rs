//! Drives a backend through emitting one complete, internally consistent set of networks.

use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::backend::{self, SimdSortBackend};
use crate::error::{Error, Result};
use crate::isa::{ElementType, VectorIsa};
use crate::network::{InlineBudget, Order};

/// File name of an artifact without the `.h` / `.cpp` extension.
pub fn artifact_stem(isa: VectorIsa, ty: ElementType) -> String {
    format!("bitonic_sort.{isa}.{ty}.generated")
}

/// Emits every network for the backend's (ISA, element type) pair.
///
/// Widths are emitted strictly increasing, so a network only ever calls networks that were
/// emitted before it. Mergers are only emitted up to the widest one a sorter needs.
pub fn generate(
    header: &mut dyn Write,
    source: &mut dyn Write,
    backend: &dyn SimdSortBackend,
    budget: InlineBudget,
) -> Result<()> {
    let max_vectors = backend.max_bitonic_sort_vectors();
    let largest_merger = backend.largest_merge_variant_needed();

    backend.generate_prologue(header)?;

    // Width 1 is the in-register base case, it's never compounded.
    for order in Order::BOTH {
        backend.generate_1v_basic_sorters(header, order)?;
        backend.generate_1v_merge_sorters(header, order)?;
    }

    for width in 2..=max_vectors {
        let inline = budget.is_inline(width);
        debug!(
            "{} {}: width {width}, inline: {inline}",
            backend.isa(),
            backend.element_type()
        );

        for order in Order::BOTH {
            backend.generate_compounded_sorter(header, width, order, inline)?;
        }

        if width <= largest_merger {
            for order in Order::BOTH {
                backend.generate_compounded_merger(header, width, order, inline)?;
            }
        }
    }

    backend.generate_entry_points(header)?;
    backend.generate_master_entry_point(header, source)?;
    backend.generate_epilogue(header)?;

    Ok(())
}

/// Generated header and source text of one (ISA, element type) pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub isa: VectorIsa,
    pub ty: ElementType,
    pub header: String,
    pub source: String,
}

impl GeneratedArtifact {
    /// Generates the artifact in memory. Unsupported pairs fail here, before any output exists.
    pub fn generate(isa: VectorIsa, ty: ElementType, budget: InlineBudget) -> Result<Self> {
        let backend = backend::make_backend(isa, ty)?;

        let mut header = String::new();
        let mut source = String::new();
        generate(&mut header, &mut source, backend.as_ref(), budget)?;

        Ok(Self {
            isa,
            ty,
            header,
            source,
        })
    }

    pub fn stem(&self) -> String {
        artifact_stem(self.isa, self.ty)
    }

    pub fn header_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}.h", self.stem()))
    }

    pub fn source_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}.cpp", self.stem()))
    }

    /// Writes the header and source file, returning their paths.
    ///
    /// Either both files are written or neither is left behind.
    pub fn write_to(&self, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
        let header_path = self.header_path(output_dir);
        let source_path = self.source_path(output_dir);

        fs::write(&header_path, &self.header)?;
        if let Err(err) = fs::write(&source_path, &self.source) {
            if let Err(remove_err) = fs::remove_file(&header_path) {
                warn!("Failed to remove {}: {remove_err}", header_path.display());
            }
            return Err(err.into());
        }

        Ok((header_path, source_path))
    }
}

/// What to generate and where to put it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub isas: Vec<VectorIsa>,
    /// Restricts the element types, `None` generates every type an ISA supports.
    pub types: Option<Vec<ElementType>>,
    pub budget: InlineBudget,
    pub output_dir: PathBuf,
}

impl GeneratorConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            isas: VectorIsa::implemented(),
            types: None,
            budget: InlineBudget::default(),
            output_dir: output_dir.into(),
        }
    }

    /// The (ISA, element type) pairs this configuration asks for, in generation order.
    pub fn pairs(&self) -> Result<Vec<(VectorIsa, ElementType)>> {
        let mut pairs = Vec::new();
        for &isa in &self.isas {
            pairs.extend(self.types_for(isa)?.into_iter().map(|ty| (isa, ty)));
        }

        Ok(pairs)
    }

    /// Element types to generate for `isa`.
    ///
    /// An explicitly requested type `isa` does not support is an error, so is an ISA that
    /// supports nothing at all.
    pub fn types_for(&self, isa: VectorIsa) -> Result<Vec<ElementType>> {
        let supported = backend::supported_types(isa)?;

        match &self.types {
            Some(types) => {
                if let Some(&ty) = types.iter().find(|&&ty| !supported.contains(&ty)) {
                    return Err(Error::UnsupportedConfiguration { isa, ty });
                }
                Ok(types.clone())
            }
            None if supported.is_empty() => Err(Error::UnsupportedIsa { isa }),
            None => Ok(supported.to_vec()),
        }
    }
}

/// Generates and writes every pair of `config`, returning the written paths.
///
/// Pairs are processed one after the other. A failing pair aborts the run, files of pairs written
/// before it stay in place.
pub fn generate_all(config: &GeneratorConfig) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(&config.output_dir)?;

    let mut written = Vec::new();
    for &isa in &config.isas {
        // Resolved per ISA, a bad ISA late in the list doesn't hold back the ones before it.
        for ty in config.types_for(isa)? {
            let artifact = GeneratedArtifact::generate(isa, ty, config.budget)?;
            info!("Generating {}.{{h,cpp}}", artifact.stem());

            let (header_path, source_path) = artifact.write_to(&config.output_dir)?;
            written.push(header_path);
            written.push(source_path);
        }
    }

    Ok(written)
}
