use crate::types::DataType;
use std::collections::HashMap;
use std::sync::LazyLock;

/// One entry of the static DMAP code table: a 4-byte wire code, its
/// dotted symbolic name, and the DMAP type id its value is packed as.
#[derive(Debug, Clone, Copy)]
pub struct CodeEntry {
    pub code: [u8; 4],
    pub name: &'static str,
    pub data_type: DataType,
}

macro_rules! codes {
    ($( ($code:literal, $name:literal, $ty:ident) ),* $(,)?) => {
        &[
            $( CodeEntry { code: *$code, name: $name, data_type: DataType::$ty } ),*
        ]
    };
}

/// The code table. Covers every code referenced by the response
/// builders plus the server/login capability fields a real DAAP client
/// expects from `/server-info` and `/content-codes`.
pub static CODE_TABLE: &[CodeEntry] = codes![
    (b"mstt", "dmap.status", Uint),
    (b"muty", "dmap.updatetype", Ubyte),
    (b"mtco", "dmap.specifiedtotalcount", Uint),
    (b"mrco", "dmap.returnedcount", Uint),
    (b"mlcl", "dmap.listing", Container),
    (b"mlit", "dmap.listingitem", Container),
    (b"mudl", "dmap.deletedidlisting", Container),
    (b"miid", "dmap.itemid", Uint),
    (b"minm", "dmap.itemname", Str),
    (b"mper", "dmap.persistentid", Ulong),
    (b"mimc", "dmap.itemcount", Uint),
    (b"mctc", "dmap.containercount", Uint),
    (b"mcti", "dmap.containeritemid", Uint),
    (b"mpco", "dmap.parentcontainerid", Uint),
    (b"mikd", "dmap.itemkind", Ubyte),
    (b"mlid", "dmap.sessionid", Uint),
    (b"mlog", "dmap.loginresponse", Container),
    (b"msrv", "dmap.serverinforesponse", Container),
    (b"mccr", "dmap.contentcodesresponse", Container),
    (b"mcnm", "dmap.contentcodesnumber", Int),
    (b"mcna", "dmap.contentcodesname", Str),
    (b"mcty", "dmap.contentcodestype", Short),
    (b"mdcl", "dmap.dictionary", Container),
    (b"mupd", "dmap.updateresponse", Container),
    (b"musr", "dmap.serverrevision", Uint),
    (b"mstm", "dmap.timeoutinterval", Uint),
    (b"msal", "dmap.supportsautologout", Byte),
    (b"msau", "dmap.authenticationmethod", Byte),
    (b"mslr", "dmap.loginrequired", Byte),
    (b"mpro", "dmap.protocolversion", Version),
    (b"apro", "daap.protocolversion", Version),
    (b"msup", "dmap.supportsupdate", Byte),
    (b"mspi", "dmap.supportspersistentids", Byte),
    (b"msex", "dmap.supportsextensions", Byte),
    (b"msed", "dmap.supportsedit", Byte),
    (b"msdc", "dmap.databasescount", Uint),
    (b"aeSD", "daap.supportsextradata", Byte),
    (b"avdb", "daap.serverdatabases", Container),
    (b"adbs", "daap.databasesongs", Container),
    (b"aply", "daap.databaseplaylists", Container),
    (b"apso", "daap.playlistsongs", Container),
    (b"abpl", "daap.baseplaylist", Byte),
    (b"aeSP", "com.apple.itunes.smart-playlist", Byte),
    (b"asal", "daap.songalbum", Str),
    (b"asfm", "daap.songformat", Str),
    (b"astn", "daap.songtracknumber", Short),
    (b"asar", "daap.songartist", Str),
    (b"asbr", "daap.songbitrate", Short),
    (b"assz", "daap.songsize", Uint),
    (b"asyr", "daap.songyear", Short),
    (b"astm", "daap.songtime", Uint),
    (b"asgn", "daap.songgenre", Str),
    (b"ascd", "daap.songartworkcount", Short),
    (b"ased", "daap.songextradata", Byte),
    (b"assn", "daap.sortname", Str),
    (b"assb", "daap.sortalbum", Str),
    (b"assc", "daap.sortartist", Str),
    (b"assd", "daap.sortalbumartist", Str),
];

static BY_CODE: LazyLock<HashMap<[u8; 4], &'static CodeEntry>> = LazyLock::new(|| {
    let mut map = HashMap::with_capacity(CODE_TABLE.len());
    for entry in CODE_TABLE {
        let prior = map.insert(entry.code, entry);
        debug_assert!(prior.is_none(), "duplicate DMAP code in table");
    }
    map
});

static BY_NAME: LazyLock<HashMap<&'static str, &'static CodeEntry>> = LazyLock::new(|| {
    let mut map = HashMap::with_capacity(CODE_TABLE.len());
    for entry in CODE_TABLE {
        let prior = map.insert(entry.name, entry);
        debug_assert!(prior.is_none(), "duplicate DMAP name in table");
    }
    map
});

pub fn lookup_code(code: &[u8; 4]) -> Option<&'static CodeEntry> {
    BY_CODE.get(code).copied()
}

pub fn lookup_name(name: &str) -> Option<&'static CodeEntry> {
    BY_NAME.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_no_duplicate_codes_or_names() {
        let mut codes = std::collections::HashSet::new();
        let mut names = std::collections::HashSet::new();
        for entry in CODE_TABLE {
            assert!(codes.insert(entry.code), "duplicate code {:?}", entry.code);
            assert!(names.insert(entry.name), "duplicate name {}", entry.name);
        }
    }

    #[test]
    fn dmap_status_resolves_to_mstt() {
        let entry = lookup_name("dmap.status").expect("dmap.status missing");
        assert_eq!(&entry.code, b"mstt");
        assert_eq!(entry.data_type, DataType::Uint);
    }

    #[test]
    fn lookup_code_is_inverse_of_lookup_name() {
        for entry in CODE_TABLE {
            let by_code = lookup_code(&entry.code).unwrap();
            assert_eq!(by_code.name, entry.name);
        }
    }
}
