//! Comprehensive tests for the AST module
//!
//! These tests compile whole statements against the fixture records and
//! check the exact SQL text and parameter lists.

use super::*;
use crate::error::{DepotError, DepotResult};
use crate::schema::{RecordType, SchemaCache};
use crate::test_records::{
    GameRecord, MembershipRecord, ScoreRecord, TagCountRecord, UserRecord, UserSummaryRecord,
};

fn compile_with(dialect: Dialect, statement: impl Into<Statement>) -> DepotResult<CompiledQuery> {
    compile(&SchemaCache::new(), dialect, &statement.into())
}

fn mysql(statement: impl Into<Statement>) -> CompiledQuery {
    compile_with(Dialect::MySql, statement).unwrap()
}

fn postgres(statement: impl Into<Statement>) -> CompiledQuery {
    compile_with(Dialect::PostgreSql, statement).unwrap()
}

mod select_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_select_where_equals() {
        let select = SelectClause::new::<UserRecord>()
            .with_where(Expr::eq(ColumnExp::new::<UserRecord>("age"), 30));
        let query = mysql(select);
        assert_eq!(
            query.sql,
            "select t0.user_id, t0.name, t0.age from USERS as t0 where t0.age = ?"
        );
        assert_eq!(query.params, vec![Value::Integer(30)]);
    }

    #[test]
    fn test_select_in_list() {
        let select = SelectClause::new::<UserRecord>().with_where(
            Expr::in_list(ColumnExp::new::<UserRecord>("user_id"), [1, 2, 3]).unwrap(),
        );
        let query = mysql(select);
        assert_eq!(
            query.sql,
            "select t0.user_id, t0.name, t0.age from USERS as t0 where t0.user_id in (?, ?, ?)"
        );
        assert_eq!(
            query.params,
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
    }

    #[test]
    fn test_single_value_in_keeps_list_form() {
        let select = SelectClause::new::<UserRecord>()
            .with_fields(["name"])
            .with_where(Expr::in_list(ColumnExp::new::<UserRecord>("user_id"), [4]).unwrap());
        assert_eq!(
            mysql(select).sql,
            "select t0.name from USERS as t0 where t0.user_id in (?)"
        );
    }

    #[test]
    fn test_clause_order_is_fixed() {
        let select = SelectClause::new::<UserRecord>()
            .with_fields(["name"])
            .for_update()
            .with_limit(Limit::new(5, 10))
            .with_order_by(
                OrderBy::descending(ColumnExp::new::<UserRecord>("age"))
                    .then(ColumnExp::new::<UserRecord>("name"), Order::Asc),
            )
            .with_where(Expr::gt(ColumnExp::new::<UserRecord>("age"), 18));
        let query = mysql(select);
        assert_eq!(
            query.sql,
            "select t0.name from USERS as t0 where t0.age > ? \
             order by t0.age desc, t0.name asc limit ? offset ? for update"
        );
        assert_eq!(
            query.params,
            vec![Value::Integer(18), Value::Integer(10), Value::Integer(5)]
        );
    }

    #[test]
    fn test_group_by() {
        let select = SelectClause::new::<GameRecord>()
            .with_fields(["owner_id"])
            .with_group_by(GroupBy::new(vec![Expr::column::<GameRecord>("owner_id")]));
        assert_eq!(
            mysql(select).sql,
            "select t0.owner_id from GAMES as t0 group by t0.owner_id"
        );
    }

    #[test]
    fn test_explicit_column_name() {
        let select = SelectClause::new::<GameRecord>()
            .with_fields(["game_id", "title"])
            .with_where(Expr::like(ColumnExp::new::<GameRecord>("title"), "c%"));
        let query = mysql(select);
        assert_eq!(
            query.sql,
            "select t0.game_id, t0.TITLE from GAMES as t0 where t0.TITLE like ?"
        );
        assert_eq!(query.params, vec![Value::from("c%")]);
    }

    #[test]
    fn test_unknown_field() {
        let select = SelectClause::new::<UserRecord>().with_fields(["nope"]);
        assert!(matches!(
            compile_with(Dialect::MySql, select),
            Err(DepotError::UnknownField { field, .. }) if field == "nope"
        ));
    }
}

mod key_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_select_by_key() {
        let select = SelectClause::new::<GameRecord>()
            .with_where(Key::new::<GameRecord>(vec![("game_id", Value::Integer(5))]));
        let query = mysql(select);
        assert_eq!(
            query.sql,
            "select t0.game_id, t0.owner_id, t0.TITLE, t0.created from GAMES as t0 \
             where t0.game_id = ?"
        );
        assert_eq!(query.params, vec![Value::Integer(5)]);
    }

    #[test]
    fn test_composite_key_in_primary_key_order() {
        let select = SelectClause::new::<MembershipRecord>()
            .with_fields(["rank"])
            .with_where(Key::new::<MembershipRecord>(vec![
                ("user_id", Value::Integer(9)),
                ("group_id", Value::Integer(3)),
            ]));
        let query = mysql(select);
        assert_eq!(
            query.sql,
            "select t0.rank from MembershipRecord as t0 where t0.group_id = ? and t0.user_id = ?"
        );
        assert_eq!(query.params, vec![Value::Integer(3), Value::Integer(9)]);
    }

    #[test]
    fn test_null_key_component() {
        let select = SelectClause::new::<MembershipRecord>()
            .with_fields(["rank"])
            .with_where(Key::new::<MembershipRecord>(vec![
                ("group_id", Value::Integer(3)),
                ("user_id", Value::Null),
            ]));
        let query = mysql(select);
        assert!(query.sql.ends_with("where t0.group_id = ? and t0.user_id is null"));
        assert_eq!(query.params, vec![Value::Integer(3)]);
    }

    #[test]
    fn test_multi_key() {
        let key = MultiKey::new::<MembershipRecord>(
            vec![("group_id", Value::Integer(1))],
            "user_id",
            vec![Value::Integer(2), Value::Integer(3)],
        )
        .unwrap();
        let query = mysql(DeleteClause::new::<MembershipRecord>(key));
        assert_eq!(
            query.sql,
            "delete from MembershipRecord where MembershipRecord.group_id = ? \
             and MembershipRecord.user_id in (?, ?)"
        );
        assert_eq!(
            query.params,
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
    }

    #[test]
    fn test_multi_key_follows_primary_key() {
        let key = MultiKey::new::<MembershipRecord>(
            vec![("group_id", Value::Integer(1))],
            "rank",
            vec![Value::Integer(2)],
        )
        .unwrap();
        assert!(matches!(
            compile_with(Dialect::MySql, DeleteClause::new::<MembershipRecord>(key)),
            Err(DepotError::KeyMismatch { .. })
        ));

        let missing = MultiKey::new::<MembershipRecord>(vec![], "user_id", vec![Value::Integer(2)])
            .unwrap();
        let select = SelectClause::new::<MembershipRecord>().with_where(missing);
        assert!(matches!(
            compile_with(Dialect::MySql, select),
            Err(DepotError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn test_key_mismatch() {
        let select = SelectClause::new::<MembershipRecord>()
            .with_where(Key::new::<MembershipRecord>(vec![("group_id", Value::Integer(3))]));
        assert!(matches!(
            compile_with(Dialect::MySql, select),
            Err(DepotError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn test_key_from_instance() {
        let cache = SchemaCache::new();
        let user = UserRecord {
            user_id: 12,
            name: "ann".into(),
            age: 33,
        };
        let key = cache.get_of::<UserRecord>().unwrap().primary_key(&user).unwrap();
        let query = compile(
            &cache,
            Dialect::MySql,
            &DeleteClause::new::<UserRecord>(key).into(),
        )
        .unwrap();
        assert_eq!(query.sql, "delete from USERS where USERS.user_id = ?");
        assert_eq!(query.params, vec![Value::Integer(12)]);
    }
}

mod join_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn owner_join() -> Join {
        Join::inner::<UserRecord>(Expr::eq(
            ColumnExp::new::<GameRecord>("owner_id"),
            ColumnExp::new::<UserRecord>("user_id"),
        ))
    }

    #[test]
    fn test_inner_join() {
        let select = SelectClause::new::<GameRecord>()
            .join(owner_join())
            .with_where(Expr::gt(ColumnExp::new::<UserRecord>("age"), 18));
        let query = mysql(select);
        assert_eq!(
            query.sql,
            "select t0.game_id, t0.owner_id, t0.TITLE, t0.created from GAMES as t0 \
             inner join USERS as t1 on t0.owner_id = t1.user_id where t1.age > ?"
        );
        assert_eq!(query.params, vec![Value::Integer(18)]);
    }

    #[test]
    fn test_left_outer_join() {
        let select = SelectClause::new::<UserRecord>()
            .with_fields(["name"])
            .join(Join::left_outer::<GameRecord>(Expr::eq(
                ColumnExp::new::<GameRecord>("owner_id"),
                ColumnExp::new::<UserRecord>("user_id"),
            )));
        assert_eq!(
            mysql(select).sql,
            "select t0.name from USERS as t0 \
             left outer join GAMES as t1 on t1.owner_id = t0.user_id"
        );
    }

    #[test]
    fn test_aliased_self_join() {
        let select = SelectClause::new::<UserRecord>()
            .with_fields(["name"])
            .join(
                Join::inner::<UserRecord>(Expr::eq(
                    ColumnExp::new::<UserRecord>("age").qualified("peer"),
                    ColumnExp::new::<UserRecord>("age"),
                ))
                .with_alias("peer"),
            )
            .with_where(Expr::not_eq(
                ColumnExp::new::<UserRecord>("user_id").qualified("peer"),
                ColumnExp::new::<UserRecord>("user_id"),
            ));
        assert_eq!(
            mysql(select).sql,
            "select t0.name from USERS as t0 inner join USERS as peer on peer.age = t0.age \
             where peer.user_id <> t0.user_id"
        );
    }

    #[test]
    fn test_unaliased_self_join_is_rejected() {
        let select = SelectClause::new::<UserRecord>()
            .with_fields(["name"])
            .join(Join::inner::<UserRecord>(Expr::eq(
                ColumnExp::new::<UserRecord>("age"),
                ColumnExp::new::<UserRecord>("age"),
            )));
        assert!(matches!(
            compile_with(Dialect::MySql, select),
            Err(DepotError::AliasCollision { alias, .. }) if alias == "t0"
        ));
    }

    #[test]
    fn test_second_unaliased_join_on_same_record_is_rejected() {
        let select = SelectClause::new::<GameRecord>()
            .join(owner_join())
            .join(owner_join());
        assert!(matches!(
            compile_with(Dialect::MySql, select),
            Err(DepotError::AliasCollision { alias, .. }) if alias == "t1"
        ));
    }

    #[test]
    fn test_join_alias_may_not_look_generated() {
        let aliased_owner = |alias: &str| {
            Join::inner::<UserRecord>(Expr::eq(
                ColumnExp::new::<GameRecord>("owner_id"),
                ColumnExp::new::<UserRecord>("user_id").qualified(alias),
            ))
            .with_alias(alias)
        };

        let select = SelectClause::new::<GameRecord>()
            .with_fields(["title"])
            .join(aliased_owner("t0"));
        let err = compile_with(Dialect::MySql, select).unwrap_err();
        assert!(matches!(err, DepotError::AliasCollision { ref alias, .. } if alias == "t0"));
        assert!(err.to_string().contains("join on `UserRecord` in select on `GameRecord`"));

        // only t followed by digits is reserved
        let select = SelectClause::new::<GameRecord>()
            .with_fields(["title"])
            .join(aliased_owner("t_owner"));
        assert_eq!(
            mysql(select).sql,
            "select t0.TITLE from GAMES as t0 \
             inner join USERS as t_owner on t0.owner_id = t_owner.user_id"
        );
    }

    #[test]
    fn test_duplicate_join_alias_is_rejected() {
        let peer = || {
            Join::inner::<UserRecord>(Expr::eq(
                ColumnExp::new::<UserRecord>("age").qualified("peer"),
                ColumnExp::new::<UserRecord>("age"),
            ))
            .with_alias("peer")
        };
        let select = SelectClause::new::<UserRecord>()
            .with_fields(["name"])
            .join(peer())
            .join(peer());
        assert!(matches!(
            compile_with(Dialect::MySql, select),
            Err(DepotError::AliasCollision { alias, .. }) if alias == "peer"
        ));
    }

    #[test]
    fn test_abbreviations_are_stable_across_builder_order() {
        let a = SelectClause::new::<GameRecord>()
            .join(owner_join())
            .with_where(Expr::gt(ColumnExp::new::<UserRecord>("age"), 18))
            .with_limit(Limit::new(0, 5));
        let b = SelectClause::new::<GameRecord>()
            .with_limit(Limit::new(0, 5))
            .with_where(Expr::gt(ColumnExp::new::<UserRecord>("age"), 18))
            .join(owner_join());
        assert_eq!(mysql(a), mysql(b));
    }

    #[test]
    fn test_unbound_record() {
        let select = SelectClause::new::<GameRecord>()
            .with_where(Expr::gt(ColumnExp::new::<UserRecord>("age"), 18));
        assert!(matches!(
            compile_with(Dialect::MySql, select),
            Err(DepotError::UnboundRecord { record, .. }) if record == "UserRecord"
        ));
    }
}

mod subselect_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_correlated_exists() {
        let games = SelectClause::new::<GameRecord>()
            .with_fields(["game_id"])
            .with_where(Expr::eq(
                ColumnExp::new::<GameRecord>("owner_id"),
                ColumnExp::new::<UserRecord>("user_id"),
            ));
        let select = SelectClause::new::<UserRecord>()
            .with_fields(["name"])
            .with_where(
                Expr::and(vec![
                    Expr::gt(ColumnExp::new::<UserRecord>("age"), 18),
                    Expr::exists(games),
                ])
                .unwrap(),
            );
        let query = mysql(select);
        assert_eq!(
            query.sql,
            "select t0.name from USERS as t0 where (t0.age > ?) and \
             (exists (select t1.game_id from GAMES as t1 where t1.owner_id = t0.user_id))"
        );
        assert_eq!(query.params, vec![Value::Integer(18)]);
    }

    #[test]
    fn test_nested_select_on_same_record() {
        let inner = SelectClause::new::<UserRecord>().with_fields(["user_id"]);
        let select = SelectClause::new::<UserRecord>().with_where(Expr::exists(inner));
        assert!(matches!(
            compile_with(Dialect::MySql, select),
            Err(DepotError::NestedSelect { .. })
        ));
    }
}

mod computed_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shadowing_record_reads_shadowed_table() {
        let select = SelectClause::new::<UserSummaryRecord>().with_group_by(GroupBy::new(vec![
            Expr::column::<UserSummaryRecord>("user_id"),
        ]));
        assert_eq!(
            mysql(select).sql,
            "select t0.user_id, t0.name, count(*) as game_count from USERS as t0 \
             group by t0.user_id"
        );
    }

    #[test]
    fn test_computed_record_needs_from() {
        assert!(matches!(
            compile_with(Dialect::MySql, SelectClause::new::<TagCountRecord>()),
            Err(DepotError::ComputedWithoutFrom { .. })
        ));
    }

    #[test]
    fn test_from_override_with_definitions() {
        let select = SelectClause::new::<TagCountRecord>()
            .with_from(FromOverride::of::<GameRecord>())
            .define(FieldDefinition::new(
                "tag",
                ColumnExp::new::<GameRecord>("title"),
            ))
            .define(FieldDefinition::new(
                "count",
                Expr::function("count", vec![Expr::literal("*")]),
            ))
            .with_group_by(GroupBy::new(vec![Expr::column::<GameRecord>("title")]));
        assert_eq!(
            mysql(select).sql,
            "select t0.TITLE as tag, count(*) as count from GAMES as t0 group by t0.TITLE"
        );
    }

    #[test]
    fn test_computed_field_without_definition() {
        let select = SelectClause::new::<TagCountRecord>().with_from(FromOverride::of::<GameRecord>());
        assert!(matches!(
            compile_with(Dialect::MySql, select),
            Err(DepotError::NoDefinition { .. })
        ));
    }

    #[test]
    fn test_optional_computed_field_skipped() {
        assert_eq!(
            mysql(SelectClause::new::<ScoreRecord>()).sql,
            "select t0.score_id, t0.points from SCORES as t0"
        );
    }

    #[test]
    fn test_field_override_only_in_projection() {
        let select = SelectClause::new::<UserRecord>()
            .define(FieldDefinition::field_override("age", Expr::literal("0")))
            .with_where(Expr::eq(ColumnExp::new::<UserRecord>("age"), 1));
        assert_eq!(
            mysql(select).sql,
            "select t0.user_id, t0.name, 0 as age from USERS as t0 where t0.age = ?"
        );
    }

    #[test]
    fn test_field_override_applies_to_key() {
        let select = SelectClause::new::<UserRecord>()
            .with_fields(["name"])
            .define(FieldDefinition::field_override(
                "user_id",
                Expr::function("abs", vec![Expr::column::<UserRecord>("user_id")]),
            ))
            .with_where(Key::new::<UserRecord>(vec![("user_id", Value::Integer(2))]));
        // the override's own column renders plainly
        assert_eq!(
            mysql(select).sql,
            "select t0.name from USERS as t0 where abs(t0.user_id) = ?"
        );
    }
}

mod write_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_identity_renders_default() {
        let user = UserRecord {
            user_id: 0,
            name: "bob".into(),
            age: 30,
        };
        let query = mysql(InsertClause::from_record(&user));
        assert_eq!(
            query.sql,
            "insert into USERS (user_id, name, age) values (default, ?, ?)"
        );
        assert_eq!(query.params, vec![Value::from("bob"), Value::Integer(30)]);
    }

    #[test]
    fn test_insert_explicit_identity_fields() {
        let membership = MembershipRecord {
            group_id: 1,
            user_id: 2,
            rank: None,
        };
        let query = postgres(InsertClause::from_record(&membership).with_identity_fields(["rank"]));
        assert_eq!(
            query.sql,
            "insert into \"MembershipRecord\" (\"group_id\", \"user_id\", \"rank\") \
             values (?, ?, default)"
        );
        assert_eq!(query.params, vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn test_insert_missing_value() {
        let insert = InsertClause::new(
            RecordType::of::<GameRecord>(),
            vec![("game_id".to_string(), Value::Integer(1))],
        );
        assert!(matches!(
            compile_with(Dialect::MySql, insert),
            Err(DepotError::MissingValue { field, .. }) if field == "owner_id"
        ));
    }

    #[test]
    fn test_update() {
        let update = UpdateClause::new::<UserRecord>()
            .set("age", Expr::add(ColumnExp::new::<UserRecord>("age"), 1))
            .set("name", "carl")
            .with_where(Key::new::<UserRecord>(vec![("user_id", Value::Integer(7))]));
        let query = mysql(update);
        assert_eq!(
            query.sql,
            "update USERS as t0 set age = t0.age + ?, name = ? where t0.user_id = ?"
        );
        assert_eq!(
            query.params,
            vec![Value::Integer(1), Value::from("carl"), Value::Integer(7)]
        );
    }

    #[test]
    fn test_update_requires_where() {
        let update = UpdateClause::new::<UserRecord>().set("age", 1);
        assert!(matches!(
            compile_with(Dialect::MySql, update),
            Err(DepotError::MissingWhere { .. })
        ));
    }

    #[test]
    fn test_delete_per_dialect() {
        let delete = || DeleteClause::new::<UserRecord>(Expr::eq(ColumnExp::new::<UserRecord>("age"), 30));
        assert_eq!(mysql(delete()).sql, "delete from USERS where USERS.age = ?");
        assert_eq!(
            postgres(delete()).sql,
            "delete from \"USERS\" as t0 where t0.\"age\" = ?"
        );
    }
}

mod dialect_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_postgres_quotes_identifiers() {
        let select = SelectClause::new::<UserRecord>()
            .with_where(Expr::eq(ColumnExp::new::<UserRecord>("age"), 30));
        assert_eq!(
            postgres(select).sql,
            "select t0.\"user_id\", t0.\"name\", t0.\"age\" from \"USERS\" as t0 \
             where t0.\"age\" = ?"
        );
    }

    #[test]
    fn test_full_text_match() {
        let select = || {
            SelectClause::new::<GameRecord>()
                .with_fields(["title"])
                .with_where(Expr::full_text_match::<GameRecord>("title", "chess"))
        };

        let query = mysql(select());
        assert_eq!(
            query.sql,
            "select t0.TITLE from GAMES as t0 where match(t0.TITLE) against (? in boolean mode)"
        );
        assert_eq!(query.params, vec![Value::from("chess")]);

        let query = postgres(select());
        assert_eq!(
            query.sql,
            "select t0.\"TITLE\" from \"GAMES\" as t0 \
             where t0.\"ftsCol_title\" @@ to_tsquery('default', ?)"
        );
    }

    #[test]
    fn test_unknown_full_text_index() {
        let select = SelectClause::new::<GameRecord>()
            .with_where(Expr::full_text_match::<GameRecord>("nope", "chess"));
        assert!(matches!(
            compile_with(Dialect::MySql, select),
            Err(DepotError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn test_epoch_seconds() {
        let cache = SchemaCache::new();
        let expr = Expr::epoch_seconds(ColumnExp::new::<GameRecord>("created"));
        assert_eq!(
            SqlCompiler::new(&cache, Dialect::MySql).compile_expr(&expr).unwrap().sql,
            "unix_timestamp(t0.created)"
        );
        assert_eq!(
            SqlCompiler::new(&cache, Dialect::PostgreSql)
                .compile_expr(&expr)
                .unwrap()
                .sql,
            "extract(epoch from t0.\"created\")"
        );
    }
}

mod property_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn condition() -> impl Strategy<Value = Expr> {
        let leaf = prop_oneof![
            any::<i32>().prop_map(|n| Expr::eq(ColumnExp::new::<UserRecord>("age"), n)),
            "[a-z%]{0,8}".prop_map(|s| Expr::like(ColumnExp::new::<UserRecord>("name"), s)),
            prop::collection::vec(any::<i32>(), 1..5).prop_map(|ids| {
                Expr::in_list(ColumnExp::new::<UserRecord>("user_id"), ids).unwrap()
            }),
            Just(Expr::is_null(ColumnExp::new::<UserRecord>("name"))),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..4).prop_map(|ops| Expr::and(ops).unwrap()),
                prop::collection::vec(inner.clone(), 1..4).prop_map(|ops| Expr::or(ops).unwrap()),
                inner.prop_map(|e| Expr::not(e)),
            ]
        })
    }

    proptest! {
        #[test]
        fn test_compile_is_deterministic(cond in condition(), count in 0u64..100) {
            let select = SelectClause::new::<UserRecord>()
                .with_where(cond)
                .with_limit(Limit::new(0, count));
            let statement: Statement = select.into();

            let shared = SchemaCache::new();
            let first = compile(&shared, Dialect::MySql, &statement).unwrap();
            let second = compile(&shared, Dialect::MySql, &statement).unwrap();
            let fresh = compile(&SchemaCache::new(), Dialect::MySql, &statement).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(&first, &fresh);
        }

        #[test]
        fn test_placeholders_match_params(cond in condition(), use_postgres in any::<bool>()) {
            let dialect = if use_postgres { Dialect::PostgreSql } else { Dialect::MySql };
            let select = SelectClause::new::<UserRecord>().with_where(cond);
            let query = compile(&SchemaCache::new(), dialect, &select.into()).unwrap();
            prop_assert_eq!(query.sql.matches('?').count(), query.params.len());
        }
    }
}
