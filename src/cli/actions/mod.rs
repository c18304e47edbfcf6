pub mod run;

use crate::exporter::ExporterOptions;

#[derive(Debug)]
pub enum Action {
    Run { options: ExporterOptions },
}
