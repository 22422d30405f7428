use thiserror::Error;

/// Errors originating from the permutation tables and frame buffers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DitherError {
    /// Matrix size outside the packable range (2..=4).
    #[error("Taille de matrice non supportée : {n}×{n} (2 à 4 attendu)")]
    UnsupportedSize {
        /// Requested matrix side.
        n: usize,
    },

    /// A matrix did not carry exactly N² cells.
    #[error("Nombre de cellules invalide pour {n}×{n} : {found} (attendu {expected})")]
    CellCount {
        /// Matrix side.
        n: usize,
        /// Expected cell count (N²).
        expected: usize,
        /// Cell count actually provided.
        found: usize,
    },

    /// A cell value does not fit the N² levels of the matrix.
    #[error("Valeur hors plage : {value} (doit être < {limit})")]
    ValueOutOfRange {
        /// Offending value.
        value: u32,
        /// Exclusive upper bound (N²).
        limit: u32,
    },

    /// A value appears twice, so the matrix is not a permutation.
    #[error("Valeur dupliquée dans la permutation : {value}")]
    DuplicateValue {
        /// Offending value.
        value: u32,
    },

    /// Packed word stream length is not a multiple of the per-matrix stride.
    #[error("Table tronquée : {words} mots pour un pas de {stride} mots par matrice")]
    TruncatedTable {
        /// Number of words provided.
        words: usize,
        /// Words per packed matrix.
        stride: usize,
    },

    /// Bits above the last packed nibble are set.
    #[error("Bits de padding non nuls dans le mot {word}")]
    PaddingBits {
        /// Index of the offending word.
        word: usize,
    },

    /// The background search ended without delivering a table.
    #[error("Recherche de permutations interrompue pour {n}×{n}")]
    SearchAborted {
        /// Matrix side that was being searched.
        n: usize,
    },

    /// Matrices of different sizes mixed in one table.
    #[error("Taille incohérente : {found}×{found} dans une table {expected}×{expected}")]
    SizeMismatch {
        /// Table matrix side.
        expected: usize,
        /// Matrix side found.
        found: usize,
    },

    /// Invalid width/height dimensions.
    #[error("Dimensions invalides : {width}×{height}")]
    InvalidDimensions {
        /// Width value.
        width: u32,
        /// Height value.
        height: u32,
    },

    /// Fragment and decision buffers of a frame have different shapes.
    #[error("Buffers incompatibles : entrée {input_width}×{input_height}, sortie {output_width}×{output_height}")]
    BufferMismatch {
        /// Fragment buffer width.
        input_width: u32,
        /// Fragment buffer height.
        input_height: u32,
        /// Decision buffer width.
        output_width: u32,
        /// Decision buffer height.
        output_height: u32,
    },
}
