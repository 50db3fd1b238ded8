//! GRBL error code decoder
//! Converts the controller's numeric parser error codes to messages for the log

/// Decode a GRBL parser error code
pub fn decode_error(code: i32) -> &'static str {
    match code {
        0 => "No error.",
        1 => "Expected command letter.",
        2 => "Bad number format.",
        3 => "'$' system command not recognized.",
        4 => "Negative value for an expected positive value.",
        8 => "'$' command only valid when idle.",
        9 => "G-code locked out during alarm or jog state.",
        11 => "Max characters per line exceeded.",
        15 => "Jog target exceeds machine travel.",
        16 => "Invalid jog command.",
        20 => "Unsupported or invalid g-code command.",
        21 => "More than one command from the same modal group.",
        22 => "Feed rate has not yet been set.",
        23 => "Command requires an integer value.",
        24 => "Two commands require axis words.",
        25 => "Repeated g-code word.",
        26 => "No axis words found in block.",
        33 => "Invalid motion target.",
        36 => "Unused words in block.",
        56 => "File not found.",
        59 => "Spindle not running.",
        74 => "Controller busy.",
        _ => "Unknown error code.",
    }
}

/// Format an error for the log
pub fn format_error(code: i32) -> String {
    format!("error:{} - {}", code, decode_error(code))
}
