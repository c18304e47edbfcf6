use crate::exporter::ExporterState;
use axum::{extract::Extension, response::Html};

fn landing_page(metrics_path: &str) -> String {
    format!(
        "<html>\n\
         <head><title>MySQLd exporter</title></head>\n\
         <body>\n\
         <h1>MySQLd exporter</h1>\n\
         <p><a href='{metrics_path}'>Metrics</a></p>\n\
         </body>\n\
         </html>\n"
    )
}

pub async fn landing(Extension(state): Extension<ExporterState>) -> Html<String> {
    Html(landing_page(&state.metrics_path))
}
