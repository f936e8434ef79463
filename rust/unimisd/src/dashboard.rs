use rusqlite::Connection;
use serde::Serialize;

use crate::model::{Course, Instructor, Student};
use crate::store::{SqliteStore, Store, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyCounts {
    pub faculty: String,
    pub departments: i64,
    pub students: i64,
    pub courses: i64,
    pub instructors: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub students: i64,
    pub courses: i64,
    pub instructors: i64,
    pub faculties: Vec<FacultyCounts>,
}

pub fn summary(conn: &Connection) -> StoreResult<Summary> {
    let store = SqliteStore::new(conn);

    // Correlated subqueries avoid double-counting across the joins.
    let mut stmt = conn.prepare(
        "SELECT
           f.name,
           (SELECT COUNT(*) FROM departments d WHERE d.faculty_id = f.id),
           (SELECT COUNT(*) FROM students s
              JOIN departments d ON d.id = s.department_id
             WHERE d.faculty_id = f.id),
           (SELECT COUNT(*) FROM courses c
              JOIN departments d ON d.id = c.department_id
             WHERE d.faculty_id = f.id),
           (SELECT COUNT(*) FROM instructors i
              JOIN departments d ON d.id = i.department_id
             WHERE d.faculty_id = f.id)
         FROM faculties f
         ORDER BY f.name",
    )?;
    let faculties = stmt
        .query_map([], |row| {
            Ok(FacultyCounts {
                faculty: row.get(0)?,
                departments: row.get(1)?,
                students: row.get(2)?,
                courses: row.get(3)?,
                instructors: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Summary {
        students: store.count::<Student>()?,
        courses: store.count::<Course>()?,
        instructors: store.count::<Instructor>()?,
        faculties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::form::test_util::{add_course, add_student, department};

    #[test]
    fn counts_roll_up_through_departments() {
        let conn = db::open_in_memory().expect("open");
        let store = SqliteStore::new(&conn);
        let cs = department(&store, "Computer Science");
        add_student(&store, "2025-0001", "Ahmed Samir", Some(&cs.id));
        add_student(&store, "2025-0002", "Mona Adel", None);
        add_course(&store, "CS101", "Programming I", Some(&cs.id));

        let s = summary(&conn).expect("summary");
        assert_eq!((s.students, s.courses, s.instructors), (2, 1, 0));
        assert_eq!(s.faculties.len(), 4);

        let computers = s
            .faculties
            .iter()
            .find(|f| f.faculty == "Faculty of Computers & Information")
            .expect("faculty");
        assert_eq!(computers.departments, 5);
        assert_eq!(computers.students, 1);
        assert_eq!(computers.courses, 1);
        assert_eq!(s.faculties.iter().map(|f| f.departments).sum::<i64>(), 17);
    }
}
