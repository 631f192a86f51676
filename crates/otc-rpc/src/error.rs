//! Error mapping for §7: every error kind surfaces to the RPC caller
//! as code `-32603` with a human-readable message (spec.md §6.1).

use jsonrpsee::types::ErrorObjectOwned;
use otc_primitives::OtcError;

const INTERNAL_ERROR_CODE: i32 = -32603;

pub(crate) fn to_rpc_error(err: OtcError) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(INTERNAL_ERROR_CODE, err.to_string(), None::<()>)
}

pub(crate) fn bad_params(message: impl Into<String>) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(INTERNAL_ERROR_CODE, message.into(), None::<()>)
}
