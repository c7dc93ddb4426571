pub(crate) mod ds;
pub(crate) mod envelope;
