use crate::base::EntityKind;
use crate::StrError;

/// Defines the location of the local matrices and of the unknowns of an operator
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Schema {
    /// Mixed form with cell-based matrices coupling the face and cell unknowns
    CellFace,

    /// Cell-based matrices coupling the node unknowns
    Node,

    /// Face-based (two-point) matrices coupling the cell unknowns
    Cell,
}

impl Schema {
    /// Parses a list of names of entity kinds carrying the unknowns
    ///
    /// The order of the names is irrelevant.
    pub fn from_names(names: &[String]) -> Result<Self, StrError> {
        let has = |name: &str| names.iter().any(|n| n == name);
        let known = names.iter().all(|n| n == "cell" || n == "face" || n == "node");
        if !known {
            log::error!("unknown schema: {:?}", names);
            return Err("schema names must be \"cell\", \"face\", or \"node\"");
        }
        match (has("cell"), has("face"), has("node")) {
            (true, true, false) => Ok(Schema::CellFace),
            (false, false, true) => Ok(Schema::Node),
            (true, false, false) => Ok(Schema::Cell),
            _ => {
                log::error!("unsupported schema: {:?}", names);
                Err("schema is not supported by the diffusion operator")
            }
        }
    }

    /// Returns the entity kind where the local matrices live
    pub fn base(&self) -> EntityKind {
        match self {
            Schema::CellFace | Schema::Node => EntityKind::Cell,
            Schema::Cell => EntityKind::Face,
        }
    }

    /// Returns the entity kinds carrying the unknowns
    pub fn dof_kinds(&self) -> &'static [EntityKind] {
        match self {
            Schema::CellFace => &[EntityKind::Cell, EntityKind::Face],
            Schema::Node => &[EntityKind::Node],
            Schema::Cell => &[EntityKind::Cell],
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
