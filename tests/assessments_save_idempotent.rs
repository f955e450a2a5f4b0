use gradebookd::cell::CellValue;
use gradebookd::db;
use gradebookd::merge::{has_any_field, has_name, AcademicPeriod};
use gradebookd::store::{self, DocumentStore, SqliteStore, ASSESSMENTS};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn period() -> AcademicPeriod {
    AcademicPeriod::new("2024-2025", 3).expect("period")
}

#[test]
fn saving_the_same_rows_twice_updates_in_place() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    for (i, name) in ["Ali", "Sara", "Omar"].iter().enumerate() {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{i}"),
            "students.create",
            json!({ "classId": "7A", "name": name }),
        );
    }

    let period_params = json!({ "classId": "7A", "year": "2024-2025", "term": 3 });
    let opened = request_ok(&mut stdin, &mut reader, "2", "assessments.open", period_params.clone());
    let mut rows = opened["rows"].as_array().expect("rows").clone();
    assert_eq!(rows.len(), 3);
    rows[0]["grades"] = json!({ "Math": 88, "Science": 91 });
    rows[1]["absences"] = json!(4);
    // A blanked name keeps its roster entry but is not saved as grade data.
    rows[2]["name"] = json!("");

    let mut save = period_params.clone();
    save["rows"] = json!(rows);
    let first = request_ok(&mut stdin, &mut reader, "3", "assessments.save", save.clone());
    let second = request_ok(&mut stdin, &mut reader, "4", "assessments.save", save);
    assert_eq!(first, second);
    assert_eq!(first["assessmentsUpserted"], json!(2));
    assert_eq!(first["skipped"], json!(1));
    assert_eq!(first["rosterUpdated"], json!(0));

    drop(stdin);
    let _ = child.wait();

    // Reopen the workspace directly and look at what landed on disk.
    let reopened = SqliteStore::new(db::open_db(workspace.path()).expect("reopen"));
    assert_eq!(reopened.list_documents(ASSESSMENTS).expect("list").len(), 2);

    let loaded = store::load_period(&reopened, "7A", &period()).expect("load");
    assert_eq!(loaded[0].name, "Ali");
    assert_eq!(loaded[0].grades.get("Math"), Some(&CellValue::Number(88.0)));
    assert_eq!(loaded[1].absences, 4);
    assert_eq!(loaded[2].name, "Omar");
    assert_eq!(loaded[2].assessment_id, None);
}

#[test]
fn filter_predicate_decides_which_rows_are_saved() {
    let mut docs = store::MemoryStore::new();
    store::create_student(&mut docs, "7A", "Ali").expect("create");
    store::create_student(&mut docs, "7A", "Sara").expect("create");

    let mut rows = store::load_period(&docs, "7A", &period()).expect("load");
    rows[1].name = " ".into();
    rows[1].notes = "needs a reading plan".into();

    let by_name = store::save_period(&mut docs, &rows, &period(), has_name).expect("save");
    assert_eq!(by_name.assessments_upserted, 1);
    let any_field = store::save_period(&mut docs, &rows, &period(), has_any_field).expect("save");
    assert_eq!(any_field.assessments_upserted, 2);
    assert_eq!(docs.count(ASSESSMENTS), 2);

    // The blank name never reached the roster.
    let roster = store::list_roster(&docs, "7A").expect("roster");
    assert_eq!(roster[1].name, "Sara");
}

#[test]
fn exported_sheet_with_extra_subjects_imports_back() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let sheet_path = workspace.path().join("term1.xlsx");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    request_ok(&mut stdin, &mut reader, "2", "students.create", json!({ "classId": "8B", "name": "Ali" }));

    let period_params = json!({ "classId": "8B", "year": "2024/2025", "term": 1 });
    let opened = request_ok(&mut stdin, &mut reader, "3", "assessments.open", period_params.clone());
    let mut rows = opened["rows"].as_array().expect("rows").clone();
    rows[0]["grades"] = json!({ "History": 77, "Math": 90 });
    let mut save = period_params.clone();
    save["rows"] = json!(rows);
    request_ok(&mut stdin, &mut reader, "4", "assessments.save", save.clone());

    let mut export = period_params.clone();
    export["path"] = json!(sheet_path.to_string_lossy());
    let exported = request_ok(&mut stdin, &mut reader, "5", "assessments.exportSheet", export.clone());
    assert_eq!(exported["sheet"], json!("2024-2025 T1"));

    // Overwrite the stored grade, then bring the exported one back.
    rows[0]["grades"] = json!({ "History": 10, "Math": 90 });
    save["rows"] = json!(rows);
    request_ok(&mut stdin, &mut reader, "6", "assessments.save", save);

    let imported = request_ok(&mut stdin, &mut reader, "7", "assessments.importSheet", export);
    assert_eq!(imported["report"]["matched"], json!(1));
    assert_eq!(imported["rows"][0]["grades"]["History"], json!(77.0));
    assert_eq!(imported["rows"][0]["grades"]["Math"], json!(90.0));

    drop(stdin);
    let _ = child.wait();
}
