//! SQL schema for the Koinonia SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.
//!
//! Table and column names keep the Spanish vocabulary the wire contract
//! already speaks; Rust identifiers stay English.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS personas (
    id_persona        INTEGER PRIMARY KEY AUTOINCREMENT,
    cedula            TEXT,
    nombres           TEXT NOT NULL,
    apellidos         TEXT NOT NULL,
    fecha_nacimiento  TEXT,             -- ISO 8601 date or NULL
    genero            TEXT,
    telefono          TEXT,
    direccion         TEXT,
    correo            TEXT,
    nivel_estudios    TEXT,
    nacionalidad      TEXT,
    profesion         TEXT,
    estado_civil      TEXT,
    lugar_trabajo     TEXT
);

-- Role directory. Fixed ids; seeded below, never mutated at runtime.
CREATE TABLE IF NOT EXISTS rol (
    id_rol  INTEGER PRIMARY KEY,
    nombre  TEXT NOT NULL UNIQUE
);
INSERT OR IGNORE INTO rol (id_rol, nombre)
VALUES (1, 'Pastor'), (2, 'Lider'), (3, 'Miembro');

CREATE TABLE IF NOT EXISTS usuarios (
    id_usuario      INTEGER PRIMARY KEY AUTOINCREMENT,
    id_persona      INTEGER NOT NULL UNIQUE REFERENCES personas(id_persona),
    id_rol          INTEGER NOT NULL REFERENCES rol(id_rol),
    nombre_usuario  TEXT NOT NULL UNIQUE,
    contrasena      TEXT NOT NULL,      -- argon2id PHC string
    activo          INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS ministerio (
    id_ministerio  INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre         TEXT NOT NULL,
    descripcion    TEXT,
    estatus        TEXT NOT NULL DEFAULT 'Activo',
    id_lider1      INTEGER REFERENCES usuarios(id_usuario),
    id_lider2      INTEGER REFERENCES usuarios(id_usuario)
);
CREATE UNIQUE INDEX IF NOT EXISTS ministerio_nombre_idx
    ON ministerio(lower(nombre));

-- A course and its rubric. Deleting a course takes its criteria, tasks,
-- grades, enrolment and attendance with it.
CREATE TABLE IF NOT EXISTS curso (
    id_curso      INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre        TEXT NOT NULL,
    descripcion   TEXT,
    fecha_inicio  TEXT NOT NULL,
    fecha_fin     TEXT NOT NULL,
    hora_inicio   TEXT NOT NULL,
    hora_fin      TEXT NOT NULL,
    id_usuario    INTEGER NOT NULL
                  REFERENCES usuarios(id_usuario) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS rubrica (
    id_rubrica       INTEGER PRIMARY KEY AUTOINCREMENT,
    id_curso         INTEGER NOT NULL
                     REFERENCES curso(id_curso) ON DELETE CASCADE,
    nombre_criterio  TEXT NOT NULL,
    porcentaje       REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS curso_participante (
    id_curso    INTEGER NOT NULL
                REFERENCES curso(id_curso) ON DELETE CASCADE,
    id_persona  INTEGER NOT NULL
                REFERENCES personas(id_persona) ON DELETE CASCADE,
    PRIMARY KEY (id_curso, id_persona)
);

CREATE TABLE IF NOT EXISTS asistencia_curso (
    id_curso    INTEGER NOT NULL
                REFERENCES curso(id_curso) ON DELETE CASCADE,
    id_persona  INTEGER NOT NULL
                REFERENCES personas(id_persona) ON DELETE CASCADE,
    fecha       TEXT NOT NULL,
    presente    INTEGER NOT NULL,
    PRIMARY KEY (id_curso, id_persona, fecha)
);

CREATE TABLE IF NOT EXISTS tarea (
    id_tarea       INTEGER PRIMARY KEY AUTOINCREMENT,
    id_curso       INTEGER NOT NULL
                   REFERENCES curso(id_curso) ON DELETE CASCADE,
    id_rubrica     INTEGER NOT NULL
                   REFERENCES rubrica(id_rubrica) ON DELETE CASCADE,
    titulo         TEXT NOT NULL,
    descripcion    TEXT,
    fecha_entrega  TEXT NOT NULL
);

-- One grade per (task, person); re-recording overwrites in place.
CREATE TABLE IF NOT EXISTS calificacion (
    id_calificacion  INTEGER PRIMARY KEY AUTOINCREMENT,
    id_tarea         INTEGER NOT NULL
                     REFERENCES tarea(id_tarea) ON DELETE CASCADE,
    id_persona       INTEGER NOT NULL
                     REFERENCES personas(id_persona) ON DELETE CASCADE,
    nota             REAL NOT NULL,
    UNIQUE (id_tarea, id_persona)
);

-- State directory. Id 5 was retired before this schema existed and is
-- deliberately never reassigned.
CREATE TABLE IF NOT EXISTS estado_evento (
    id_estado  INTEGER PRIMARY KEY,
    nombre     TEXT NOT NULL
);
INSERT OR IGNORE INTO estado_evento (id_estado, nombre)
VALUES (1, 'Pendiente'), (2, 'Aprobado'), (3, 'Rechazado'),
       (4, 'Cancelado'), (6, 'Pospuesto');

CREATE TABLE IF NOT EXISTS eventos (
    id_evento       INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre          TEXT NOT NULL,
    id_ministerio   INTEGER NOT NULL REFERENCES ministerio(id_ministerio),
    descripcion     TEXT,
    fecha           TEXT NOT NULL,
    hora            TEXT NOT NULL,
    lugar           TEXT,
    id_usuario      INTEGER
                    REFERENCES usuarios(id_usuario) ON DELETE SET NULL,
    id_estado       INTEGER NOT NULL DEFAULT 1
                    REFERENCES estado_evento(id_estado),
    creado_en       TEXT NOT NULL,
    actualizado_en  TEXT NOT NULL
);

-- Append-only audit trail of event state changes.
CREATE TABLE IF NOT EXISTS motivos_evento (
    id_motivo      INTEGER PRIMARY KEY AUTOINCREMENT,
    id_evento      INTEGER NOT NULL
                   REFERENCES eventos(id_evento) ON DELETE CASCADE,
    id_usuario     INTEGER NOT NULL REFERENCES usuarios(id_usuario),
    descripcion    TEXT NOT NULL,
    registrado_en  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notificaciones (
    id_notificacion  INTEGER PRIMARY KEY AUTOINCREMENT,
    id_evento        INTEGER
                     REFERENCES eventos(id_evento) ON DELETE SET NULL,
    id_emisor        INTEGER
                     REFERENCES usuarios(id_usuario) ON DELETE SET NULL,
    id_receptor      INTEGER NOT NULL
                     REFERENCES usuarios(id_usuario) ON DELETE CASCADE,
    tipo             TEXT NOT NULL,   -- 'solicitud_cancelacion' | 'respuesta_rechazo'
    mensaje          TEXT NOT NULL,
    motivo_rechazo   TEXT,
    leida            INTEGER NOT NULL DEFAULT 0,
    accion_tomada    INTEGER,         -- NULL until the recipient decides
    creada_en        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS rubrica_curso_idx        ON rubrica(id_curso);
CREATE INDEX IF NOT EXISTS tarea_curso_idx          ON tarea(id_curso);
CREATE INDEX IF NOT EXISTS calificacion_persona_idx ON calificacion(id_persona);
CREATE INDEX IF NOT EXISTS eventos_usuario_idx      ON eventos(id_usuario);
CREATE INDEX IF NOT EXISTS notif_receptor_idx       ON notificaciones(id_receptor);

PRAGMA user_version = 1;
";
