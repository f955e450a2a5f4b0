use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{db_err, param_str, store_mut};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, DocumentStore, STUDENTS};
use serde_json::json;

fn non_blank<'a>(req: &'a Request, key: &str) -> Result<&'a str, HandlerErr> {
    let v = param_str(req, key)?.trim();
    if v.is_empty() {
        return Err(HandlerErr::bad_params(format!("{key} must not be blank")));
    }
    Ok(v)
}

fn students_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let class_id = param_str(req, "classId")?;
    let docs = store_mut(state)?;
    let students = store::list_roster(docs, class_id).map_err(db_err)?;
    Ok(json!({ "students": students }))
}

fn students_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let class_id = non_blank(req, "classId")?;
    let name = non_blank(req, "name")?;
    let docs = store_mut(state)?;
    let student = store::create_student(docs, class_id, name).map_err(db_err)?;
    tracing::info!(class_id, student_id = %student.id, "student created");
    Ok(json!({ "student": student }))
}

fn students_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = param_str(req, "studentId")?;
    let name = non_blank(req, "name")?;
    let docs = store_mut(state)?;
    if docs.get_document(STUDENTS, student_id).map_err(db_err)?.is_none() {
        return Err(HandlerErr::new("not_found", "student not found")
            .with_details(json!({ "studentId": student_id })));
    }
    let student = store::rename_student(docs, student_id, name).map_err(db_err)?;
    Ok(json!({ "student": student }))
}

fn students_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = param_str(req, "studentId")?;
    let docs = store_mut(state)?;
    if !store::delete_student(docs, student_id).map_err(db_err)? {
        return Err(HandlerErr::new("not_found", "student not found")
            .with_details(json!({ "studentId": student_id })));
    }
    tracing::info!(student_id, "student deleted");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state, req),
        "students.create" => students_create(state, req),
        "students.update" => students_update(state, req),
        "students.delete" => students_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
