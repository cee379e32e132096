use anyhow::{bail, Context, Result};
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{ContentArrangement, Table};
use tracing::{debug, info_span};

use odontograma_core::editor::{AbortReason, EditorError, EditorPhase, EditorSession};
use odontograma_core::models::{condition, Dentition, Odontogram, Quadrant, ToothState, CONDITIONS};
use odontograma_core::{ClinicConfig, OdontogramStore, SqliteStore};

use crate::cli::{ChartArgs, CreateArgs, DeleteArgs, NoteArgs, ShowArgs, SurfaceArgs, ToggleArgs};

/// Open the clinic store resolved from the command line.
pub fn open_store(config: &ClinicConfig) -> Result<SqliteStore> {
    SqliteStore::open(config).context("open clinic database")
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100)
        .set_header(header);
    table
}

fn quadrant_label(quadrant: Quadrant) -> &'static str {
    match quadrant {
        Quadrant::UpperRight => "Superior derecho",
        Quadrant::UpperLeft => "Superior izquierdo",
        Quadrant::LowerRight => "Inferior derecho",
        Quadrant::LowerLeft => "Inferior izquierdo",
    }
}

fn condition_labels(state: &ToothState) -> String {
    state
        .conditions()
        .iter()
        .map(|code| condition::find(code).map_or(code.as_str(), |c| c.label))
        .collect::<Vec<_>>()
        .join("; ")
}

fn surface_notes(state: &ToothState) -> String {
    state
        .surfaces()
        .iter()
        .map(|(surface, note)| format!("{}: {}", surface, note))
        .collect::<Vec<_>>()
        .join("\n")
}

fn tooth_line(tooth: u8, state: &ToothState) -> String {
    format!("Diente {}: {} ({})", tooth, state.summary(), condition_labels(state))
}

pub fn run_conditions() -> String {
    let mut table = new_table(vec!["Código", "Condición", "Color"]);
    for c in CONDITIONS.iter() {
        table.add_row(vec![c.code, c.label, condition::display_color(c.code).as_str()]);
    }
    table.to_string()
}

pub fn run_layout(dentition: Dentition) -> String {
    let mut table = new_table(vec!["Cuadrante", "Dientes"]);
    for quadrant in Quadrant::ALL {
        let teeth = dentition
            .quadrant(quadrant)
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![quadrant_label(quadrant).to_string(), teeth]);
    }
    format!("{} ({} dientes)\n{}", dentition.label(), dentition.tooth_count(), table)
}

pub fn run_create(store: &SqliteStore, args: &CreateArgs) -> Result<String> {
    let chart = store
        .create(&args.patient.patient, args.tipo)
        .context("create odontogram")?;
    Ok(chart.id().to_string())
}

pub fn run_list(store: &SqliteStore, patient: &str) -> Result<String> {
    let charts = store.list(patient).context("list odontograms")?;
    if charts.is_empty() {
        return Ok(format!("El paciente {} no tiene odontogramas", patient));
    }

    let mut table = new_table(vec!["Id", "Tipo", "Fecha", "Dientes", "Notas"]);
    for chart in &charts {
        table.add_row(vec![
            chart.id().to_string(),
            chart.dentition().to_string(),
            chart.charted_at().to_string(),
            chart.teeth().len().to_string(),
            chart.notes().to_string(),
        ]);
    }
    Ok(table.to_string())
}

fn render_chart(chart: &Odontogram) -> String {
    let mut out = format!(
        "Odontograma {} ({}, {})\n",
        chart.id(),
        chart.dentition().label(),
        chart.charted_at()
    );

    if chart.teeth().is_empty() {
        out.push_str("Sin hallazgos registrados\n");
    } else {
        let mut table = new_table(vec!["Diente", "Estados", "Condiciones", "Superficies"]);
        for (tooth, state) in chart.teeth() {
            table.add_row(vec![
                tooth.to_string(),
                state.summary(),
                condition_labels(state),
                surface_notes(state),
            ]);
        }
        out.push_str(&table.to_string());
        out.push('\n');
    }

    if !chart.notes().is_empty() {
        out.push_str(&format!("Notas: {}\n", chart.notes()));
    }
    out
}

pub fn run_show(store: &SqliteStore, args: &ShowArgs) -> Result<String> {
    let chart = store
        .load(&args.chart.patient, &args.chart.id)
        .context("load odontogram")?;
    if args.json {
        return serde_json::to_string_pretty(&chart.to_document()).context("encode odontogram");
    }
    Ok(render_chart(&chart))
}

/// Open an editor session, apply one edit, and save it.
fn edit<F>(store: &SqliteStore, chart: &ChartArgs, apply: F) -> Result<EditorSession>
where
    F: FnOnce(&mut EditorSession) -> Result<(), EditorError>,
{
    let span = info_span!("edit", patient_id = %chart.patient, odontogram_id = %chart.id);
    let _guard = span.enter();

    let mut session = EditorSession::attach(store, &chart.patient, &chart.id);
    match session.phase() {
        EditorPhase::Ready => {}
        EditorPhase::Aborted(AbortReason::NotFound) => {
            return Err(EditorError::not_found(&session).into())
        }
        phase => bail!("cannot edit odontogram: editor is {}", phase),
    }

    apply(&mut session)?;
    if session.is_dirty() {
        session.save(store).context("save odontogram")?;
    } else {
        debug!("nothing to save");
    }
    session.close();
    Ok(session)
}

pub fn run_toggle(store: &SqliteStore, args: &ToggleArgs) -> Result<String> {
    let session = edit(store, &args.chart, |session| {
        session.select_tooth(Some(args.tooth))?;
        session.toggle_condition(&args.code, !args.off)?;
        Ok(())
    })?;
    Ok(tooth_line(args.tooth, &session.tooth_state(args.tooth)))
}

pub fn run_note(store: &SqliteStore, args: &NoteArgs) -> Result<String> {
    edit(store, &args.chart, |session| session.set_notes(&args.text))?;
    Ok("Notas guardadas".to_string())
}

pub fn run_surface(store: &SqliteStore, args: &SurfaceArgs) -> Result<String> {
    let session = edit(store, &args.chart, |session| {
        session.select_tooth(Some(args.tooth))?;
        session.set_surface_note(args.surface, &args.text)?;
        Ok(())
    })?;

    let state = session.tooth_state(args.tooth);
    Ok(match state.surface_note(args.surface) {
        Some(note) => format!("Diente {} {}: {}", args.tooth, args.surface, note),
        None => format!("Diente {} {}: sin nota", args.tooth, args.surface),
    })
}

pub fn run_delete(store: &SqliteStore, args: &DeleteArgs) -> Result<String> {
    let patient = &args.patient.patient;
    match (&args.id, args.all) {
        (_, true) => {
            let removed = store
                .delete_all_for_patient(patient)
                .context("delete odontograms")?;
            Ok(format!("{} odontogramas eliminados", removed))
        }
        (Some(id), false) => {
            if store.delete(patient, id).context("delete odontogram")? {
                Ok(format!("Odontograma {} eliminado", id))
            } else {
                bail!("odontogram not found: {}/{}", patient, id)
            }
        }
        (None, false) => bail!("either --id or --all is required"),
    }
}
