#![no_main]

use libfuzzer_sys::fuzz_target;

use fwrestore::{DataType, MsgType};

fuzz_target!(|data: &[u8]| {
    let s = std::str::from_utf8(data).unwrap_or("");

    let msg_type = MsgType::from(s);
    match s {
        "ProgressMsg" => assert_eq!(msg_type, MsgType::Progress),
        "DataRequestMsg" => assert_eq!(msg_type, MsgType::DataRequest),
        "StatusMsg" => assert_eq!(msg_type, MsgType::Status),
        _ => assert_eq!(msg_type, MsgType::Unknown),
    }

    let data_type = DataType::from(s);
    match s {
        "SystemImageData" => assert_eq!(data_type, DataType::SystemImageData),
        "KernelCache" => assert_eq!(data_type, DataType::KernelCache),
        "NORData" => assert_eq!(data_type, DataType::NorData),
        _ => assert_eq!(data_type, DataType::Unknown),
    }
});
